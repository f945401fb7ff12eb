use thiserror::Error;

use super::backend::{classify_error, ErrorClass};

/// Recognizer-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognizerError {
    /// `start()` failed synchronously with the given error code
    #[error("Recognizer start failed: {code}")]
    StartFailed { code: String },

    /// No recognition backend is available on this host
    #[error("Recognition backend unavailable: {0}")]
    Unavailable(String),
}

impl RecognizerError {
    /// Whether this error indicates a permission denial
    pub fn is_permission(&self) -> bool {
        match self {
            Self::StartFailed { code } => classify_error(code) == ErrorClass::FatalPermission,
            Self::Unavailable(_) => false,
        }
    }

    /// The reported error code, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::StartFailed { code } => Some(code),
            Self::Unavailable(_) => None,
        }
    }
}

/// Result type for recognizer operations
pub type RecognizerResult<T> = Result<T, RecognizerError>;
