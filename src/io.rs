//! File collaborator used by `:write` and `:read`.
//!
//! The engine never touches the filesystem itself; hosts hand it a `FileIo`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FileIoError {
    #[error("File exists: {0}")]
    AlreadyExists(String),
    #[error("Can't open file {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("{path}: {message}")]
    Other { path: String, message: String },
}

impl FileIoError {
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        let shown = path.display().to_string();
        match err.kind() {
            ErrorKind::NotFound => FileIoError::NotFound(shown),
            ErrorKind::AlreadyExists => FileIoError::AlreadyExists(shown),
            ErrorKind::PermissionDenied => FileIoError::PermissionDenied(shown),
            _ => FileIoError::Other {
                path: shown,
                message: err.to_string(),
            },
        }
    }
}

pub trait FileIo {
    /// Write `content` to `path`. Must fail with `AlreadyExists` when the path
    /// exists and `overwrite` is false.
    fn write_file(&mut self, path: &Path, content: &str, overwrite: bool)
        -> Result<(), FileIoError>;

    fn read_file(&mut self, path: &Path) -> Result<String, FileIoError>;
}

/// `FileIo` backed by the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileIo;

impl FileIo for FsFileIo {
    fn write_file(
        &mut self,
        path: &Path,
        content: &str,
        overwrite: bool,
    ) -> Result<(), FileIoError> {
        if !overwrite && path.exists() {
            return Err(FileIoError::AlreadyExists(path.display().to_string()));
        }
        fs::write(path, content).map_err(|e| FileIoError::from_io(path, e))
    }

    fn read_file(&mut self, path: &Path) -> Result<String, FileIoError> {
        fs::read_to_string(path).map_err(|e| FileIoError::from_io(path, e))
    }
}

/// In-memory `FileIo`, handy for hosts without a real filesystem and for tests.
/// Clones share the same files.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileIo {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryFileIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files().insert(path.into(), content.into());
        self
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files().get(path.as_ref()).cloned()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        // a panic while holding the lock leaves the map itself intact
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FileIo for MemoryFileIo {
    fn write_file(
        &mut self,
        path: &Path,
        content: &str,
        overwrite: bool,
    ) -> Result<(), FileIoError> {
        let mut files = self.files();
        if !overwrite && files.contains_key(path) {
            return Err(FileIoError::AlreadyExists(path.display().to_string()));
        }
        files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn read_file(&mut self, path: &Path) -> Result<String, FileIoError> {
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| FileIoError::NotFound(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_refuses_overwrite_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.md");
        let mut io = FsFileIo;

        io.write_file(&path, "first\n", false).unwrap();
        let err = io.write_file(&path, "second\n", false).unwrap_err();
        assert!(matches!(err, FileIoError::AlreadyExists(_)));
        assert_eq!(io.read_file(&path).unwrap(), "first\n");

        io.write_file(&path, "second\n", true).unwrap();
        assert_eq!(io.read_file(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_fs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut io = FsFileIo;
        let err = io.read_file(&dir.path().join("missing.md")).unwrap_err();
        assert!(matches!(err, FileIoError::NotFound(_)));
    }

    #[test]
    fn test_memory_io() {
        let mut io = MemoryFileIo::new().with_file("a.md", "alpha\n");
        assert_eq!(io.read_file(Path::new("a.md")).unwrap(), "alpha\n");
        assert!(io.write_file(Path::new("a.md"), "x", false).is_err());
        io.write_file(Path::new("b.md"), "beta\n", false).unwrap();
        assert_eq!(io.get("b.md").as_deref(), Some("beta\n"));
    }

    #[test]
    fn test_memory_io_clones_share_files() {
        let io = MemoryFileIo::new();
        let mut handle = io.clone();
        handle.write_file(Path::new("c.md"), "gamma", false).unwrap();
        assert_eq!(io.get("c.md").as_deref(), Some("gamma"));
    }
}
