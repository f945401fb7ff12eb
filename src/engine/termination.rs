use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::trace;

/// A teardown wait issued for one recognizer instance
///
/// Only the highest generation issued for a target may resolve; earlier
/// generations are silently invalidated. This keeps a slow terminal event
/// arriving after a later teardown/start cycle from retroactively mutating
/// state that belongs to a newer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTermination {
    /// Instance id the wait targets
    pub target: u64,
    /// Generation captured when the wait was issued
    pub generation: u64,
}

/// Generation bookkeeping for recognizer teardowns
///
/// Cancellation here is by supersession, never by direct cancellation calls:
/// the unreliable resource may fire events after a caller believes it has
/// been cancelled, so stale resolutions are discarded by generation check
/// instead.
#[derive(Debug, Default)]
pub struct TerminationCoordinator {
    generations: HashMap<u64, u64>,
}

impl TerminationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new wait for the given instance, superseding earlier ones
    pub fn begin(&mut self, target: u64) -> PendingTermination {
        let generation = self.generations.entry(target).or_insert(0);
        *generation += 1;
        trace!(target, generation = *generation, "Termination wait issued");
        PendingTermination {
            target,
            generation: *generation,
        }
    }

    /// Whether a resolution for this wait may still be honored
    pub fn is_current(&self, pending: &PendingTermination) -> bool {
        self.generations.get(&pending.target) == Some(&pending.generation)
    }

    /// Drop bookkeeping for an instance that is fully released
    pub fn forget(&mut self, target: u64) {
        self.generations.remove(&target);
    }
}

/// Wait for an instance's terminal event, bounded by a timeout
///
/// Returns `true` when the wait timed out. A timeout is treated identically
/// to a terminal event by callers (the stuck resource must not block the
/// engine); it is a control-flow outcome, not an error. A closed watch means
/// the instance is gone, which also counts as terminated.
pub async fn await_termination(mut terminal: watch::Receiver<bool>, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, terminal.wait_for(|ended| *ended))
        .await
        .is_err()
}
