mod common;

use common::{engine_with_io, lines, status};
use notemode::{EngineError, ExOutcome, FsFileIo, QuitKind};

#[test]
fn write_and_read_through_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.md");
    std::fs::write(&path, "alpha\nbeta\n").unwrap();

    let mut e = engine_with_io("alpha\nbeta", FsFileIo).with_file_name(&path);
    e.handle_keys("ddp:w<CR>");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "beta\nalpha\n");
    assert!(!e.is_modified());
    assert!(status(&e).ends_with("2L, 11B written"));

    let other = dir.path().join("other.md");
    std::fs::write(&other, "keep\n").unwrap();
    let cmd = format!("w {}", other.display());
    assert_eq!(e.execute_ex(&cmd).unwrap_err(), EngineError::FileExists);
    assert_eq!(std::fs::read_to_string(&other).unwrap(), "keep\n");

    let cmd = format!("0r {}", other.display());
    e.execute_ex(&cmd).unwrap();
    assert_eq!(lines(&e), vec!["keep", "beta", "alpha"]);
}

#[test]
fn write_quit_reports_written_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.md");

    let mut e = engine_with_io("draft", FsFileIo).with_file_name(&path);
    let effects = e.handle_keys("A!<Esc>:wq<CR>");
    assert_eq!(effects.quit, Some(QuitKind::Quit));
    assert_eq!(effects.written.as_deref(), Some(path.as_path()));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "draft!\n");
}

#[test]
fn unnamed_buffer_takes_the_written_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("named.md");

    let mut e = engine_with_io("text", FsFileIo);
    assert_eq!(e.execute_ex("w").unwrap_err(), EngineError::NoFileName);
    let outcome = e.execute_ex(&format!("w {}", path.display())).unwrap();
    assert!(matches!(outcome, ExOutcome::Message(_)));
    assert_eq!(e.file_name(), Some(path.as_path()));
    assert_eq!(e.execute_ex("q").unwrap(), ExOutcome::Quit(QuitKind::Quit));
}

#[test]
fn read_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine_with_io("a", FsFileIo);
    e.handle_keys(&format!(":r {}<CR>", dir.path().join("missing.md").display()));
    assert!(status(&e).starts_with("Can't open file"));
    assert_eq!(lines(&e), vec!["a"]);
}

#[test]
fn write_refusal_survives_later_keys() {
    let dir = tempfile::tempdir().unwrap();
    let other = dir.path().join("x");
    std::fs::write(&other, "keep\n").unwrap();

    let mut e = engine_with_io("foo", FsFileIo);
    let effects = e.handle_keys(&format!(":w {}<CR>/foo<CR>", other.display()));
    let status = effects.status.unwrap();
    assert!(status.is_error);
    assert_eq!(status.text, "File exists (add ! to override)");
    assert_eq!(effects.errors.len(), 1);
    assert_eq!(std::fs::read_to_string(&other).unwrap(), "keep\n");
}
