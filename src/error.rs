use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Debug adapter not found: {0}")]
    AdapterNotFound(String),

    /// Frame decoding failed. `fatal` is set when the header itself was
    /// malformed and the codec discarded its buffer.
    #[error("Decode error: {message}")]
    Decode { message: String, fatal: bool },

    #[error("{message}")]
    AdapterFailure { command: String, message: String },

    #[error("Timed out waiting for '{command}' after {after:?}")]
    Timeout { command: String, after: Duration },

    #[error("{0}")]
    Precondition(String),

    #[error("Debug adapter exited")]
    AdapterExited,

    #[error("Process error: {0}")]
    Process(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
            fatal: false,
        }
    }

    pub fn fatal_decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
            fatal: true,
        }
    }

    pub fn no_session() -> Self {
        Error::Precondition("No active debug session".to_string())
    }

    pub fn no_thread() -> Self {
        Error::Precondition("No active thread: the program has not stopped yet".to_string())
    }

    pub fn error_code(&self) -> i32 {
        match self {
            Error::AdapterNotFound(_) => -32002,
            Error::AdapterFailure { .. } => -32003,
            Error::Process(_) | Error::AdapterExited => -32004,
            Error::Timeout { .. } => -32005,
            Error::Precondition(_) => -32006,
            Error::Decode { .. } => -32700,
            Error::InvalidRequest(_) => -32600,
            Error::MethodNotFound(_) => -32601,
            Error::Internal(_) => -32603,
            Error::Io(_) | Error::Json(_) => -32603,
        }
    }
}
