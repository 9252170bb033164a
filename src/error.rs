use thiserror::Error;

use crate::io::FileIoError;

/// Broad classes of engine failures, used by hosts to decide how loudly to report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed key sequence or ex-command syntax
    Parse,
    /// Well-formed input that refers to something invalid (mark, address, pattern)
    Semantic,
    /// Failure reported by a host collaborator (file I/O)
    Collaborator,
}

/// Errors produced while executing a command.
///
/// Every variant is recoverable: the engine reports it as a status message
/// and leaves the buffer and undo history as they were before the command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Not an editor command: {0}")]
    NotAnEditorCommand(String),

    #[error("Trailing characters: {0}")]
    TrailingCharacters(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Argument required")]
    ArgumentRequired,

    #[error("Invalid range")]
    InvalidRange,

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Invalid regular expression: {0}")]
    InvalidPattern(String),

    #[error("No previous regular expression")]
    NoPreviousPattern,

    #[error("No previous substitute")]
    NoPreviousSubstitute,

    #[error("Pattern not found: {0}")]
    PatternNotFound(String),

    #[error("search hit BOTTOM without match for: {0}")]
    HitBottom(String),

    #[error("search hit TOP without match for: {0}")]
    HitTop(String),

    #[error("Mark not set")]
    MarkNotSet(char),

    #[error("Invalid mark name: {0}")]
    InvalidMark(char),

    #[error("Invalid register name: {0}")]
    InvalidRegister(char),

    #[error("Nothing in register {0}")]
    EmptyRegister(char),

    #[error("Cannot move a range of lines into itself")]
    MoveIntoSelf,

    #[error("Cannot do :global recursive")]
    RecursiveGlobal,

    #[error("Recursive mapping")]
    RecursiveMapping,

    #[error("Recursive macro")]
    RecursiveMacro,

    #[error("Cannot record into register {0} while it is playing")]
    RegisterBusy(char),

    #[error("No string under cursor")]
    NoStringUnderCursor,

    #[error("No previously used register")]
    NoPreviousRegister,

    #[error("No write since last change (add ! to override)")]
    NoWriteSinceLastChange,

    #[error("No such mapping")]
    NoSuchMapping,

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Range of {lines} lines exceeds line_limit of {limit}")]
    LineLimit { lines: usize, limit: usize },

    #[error("Resulting text too long")]
    TextTooLong,

    #[error("No file name")]
    NoFileName,

    #[error("File exists (add ! to override)")]
    FileExists,

    #[error("{0}")]
    Io(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::NotAnEditorCommand(_)
            | EngineError::TrailingCharacters(_)
            | EngineError::InvalidArgument(_)
            | EngineError::ArgumentRequired
            | EngineError::InvalidPattern(_)
            | EngineError::UnknownOption(_) => ErrorCategory::Parse,
            EngineError::FileExists | EngineError::Io(_) => ErrorCategory::Collaborator,
            _ => ErrorCategory::Semantic,
        }
    }
}

impl From<FileIoError> for EngineError {
    fn from(err: FileIoError) -> Self {
        match err {
            FileIoError::AlreadyExists(_) => EngineError::FileExists,
            other => EngineError::Io(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
