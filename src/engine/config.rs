use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bound on a teardown wait (milliseconds)
pub const DEFAULT_TERMINATION_TIMEOUT_MS: u64 = 2000;

/// Default number of consecutive start attempts per reconciliation pass
pub const DEFAULT_MAX_START_ATTEMPTS: u32 = 2;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound on a teardown wait (milliseconds); a timeout is treated as a
    /// successful termination
    pub termination_timeout_ms: u64,

    /// Whether teardown aborts before stopping, for faster cancellation
    pub abort_before_stop: bool,

    /// Consecutive start attempts allowed per reconciliation pass; the
    /// second attempt is the one-shot fresh-instance recovery
    pub max_start_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            termination_timeout_ms: DEFAULT_TERMINATION_TIMEOUT_MS,
            abort_before_stop: true,
            max_start_attempts: DEFAULT_MAX_START_ATTEMPTS,
        }
    }
}

impl EngineConfig {
    /// The teardown wait bound as a `Duration`
    pub fn termination_timeout(&self) -> Duration {
        Duration::from_millis(self.termination_timeout_ms)
    }
}
