use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    NotFound(String),
    Daemon(String),
    ConnectionFailed(String),
    FileSystemError(String),
    Timeout(Duration),
}

impl RuntimeError {
    /// The daemon may or may not have applied the call.
    pub(crate) fn is_uncertain(&self) -> bool {
        matches!(self, RuntimeError::Timeout(_) | RuntimeError::ConnectionFailed(_))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NotFound(msg) => write!(f, "{}", msg),
            RuntimeError::Daemon(msg) => write!(f, "{}", msg),
            RuntimeError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            RuntimeError::FileSystemError(msg) => write!(f, "File system error: {}", msg),
            RuntimeError::Timeout(deadline) => {
                write!(f, "Runtime call timed out after {:?}", deadline)
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::FileSystemError(format!("{}", err))
    }
}
