use thiserror::Error;

/// Engine handle errors
///
/// Recognizer-level failures never surface here; they are absorbed into
/// store state (`last_error`, `permission`). These errors only concern the
/// engine handle itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine task is gone
    #[error("Engine channel closed")]
    ChannelClosed,

    /// The engine was already shut down
    #[error("Engine is not running")]
    NotRunning,
}

/// Result type for engine handle operations
pub type EngineResult<T> = Result<T, EngineError>;
