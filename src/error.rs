use std::io;
use thiserror::Error;

/// Main error type for gio-adapter operations
#[derive(Error, Debug)]
pub enum GioAdapterError {
    #[error("gio tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Unexpected gio output: {0}")]
    Parse(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("{op} {path}: {message}")]
    Process {
        op: String,
        path: String,
        message: String,
    },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GioAdapterError {
    /// Build a process failure carrying the operation, the addressed path and
    /// the diagnostic printed by the tool
    pub fn process(op: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        GioAdapterError::Process {
            op: op.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Map error to an `io::ErrorKind` for the byte-stream boundary
    pub fn to_io_error_kind(&self) -> io::ErrorKind {
        match self {
            GioAdapterError::ToolUnavailable(_) => io::ErrorKind::NotFound,
            GioAdapterError::Parse(_) => io::ErrorKind::InvalidData,
            GioAdapterError::NotFound(_) => io::ErrorKind::NotFound,
            GioAdapterError::Process { .. } => io::ErrorKind::Other,
            GioAdapterError::Stream(_) => io::ErrorKind::BrokenPipe,
            GioAdapterError::Cancelled => io::ErrorKind::Interrupted,
            GioAdapterError::Io(e) => e.kind(),
            GioAdapterError::Config(_) => io::ErrorKind::InvalidInput,
        }
    }
}

/// Result type alias for gio-adapter operations
pub type Result<T> = std::result::Result<T, GioAdapterError>;
