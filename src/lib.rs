//! A Vim-style modal editing engine.
//!
//! Hosts own a text buffer (anything implementing [`BufferAdapter`]) and a
//! [`FileIo`]; the [`Engine`] turns key events into edits, cursor moves,
//! status messages and ex command effects.

pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod input;
pub mod io;

pub use config::{load_settings, Options, Settings};
pub use editor::{
    Buffer, BufferAdapter, Engine, EngineEffects, ExOutcome, Mode, Position, QuitKind, RegisterContent,
    SearchDirection, StatusMessage,
};
pub use error::{EngineError, ErrorCategory};
pub use io::{FileIo, FileIoError, FsFileIo, MemoryFileIo};
