use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("{what} index {index} out of range (len {len})")]
    Index {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("unknown key '{0}'")]
    NotFound(String),
    #[error("key '{0}' is already registered")]
    DuplicateKey(String),
    #[error("validation failed for '{action}': {reason}")]
    Validation { action: String, reason: String },
    #[error("capability unavailable: {0}")]
    Capability(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("action '{action}' failed on frame {frame}: {reason}")]
    ActionFailed {
        action: String,
        frame: usize,
        reason: String,
    },
    #[error("run cancelled before frame {frame}")]
    Cancelled { frame: usize },
}

pub type TrajResult<T> = Result<T, TrajError>;

impl TrajError {
    pub fn index(what: &'static str, index: usize, len: usize) -> Self {
        TrajError::Index { what, index, len }
    }

    pub fn validation(action: impl Into<String>, reason: impl Into<String>) -> Self {
        TrajError::Validation {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
