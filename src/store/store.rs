use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use super::state::{changed_keys, reduce, StateKey, VoiceAction, VoiceState};

/// A key-filtered subscriber entry
struct KeyListener {
    keys: Vec<StateKey>,
    tx: mpsc::UnboundedSender<StateKey>,
}

/// The voice state store
///
/// Holds the single `VoiceState` value and notifies subscribers on change.
/// Reads are lock-free via `ArcSwap`; dispatch is synchronous and can be
/// called from any thread.
///
/// # Examples
///
/// ```
/// use echoflow::store::{VoiceAction, VoiceStore};
///
/// let store = VoiceStore::new();
/// store.dispatch(VoiceAction::SetWantListening(true));
/// assert!(store.get_state().want_listening);
/// ```
pub struct VoiceStore {
    /// Current state (lock-free reads)
    state: ArcSwap<VoiceState>,

    /// Full-state subscribers
    listeners: Mutex<Vec<mpsc::UnboundedSender<Arc<VoiceState>>>>,

    /// Key-filtered subscribers
    key_listeners: Mutex<Vec<KeyListener>>,
}

impl VoiceStore {
    /// Create a store holding the default state
    pub fn new() -> Self {
        Self::with_state(VoiceState::default())
    }

    /// Create a store holding the given initial state
    pub fn with_state(state: VoiceState) -> Self {
        Self {
            state: ArcSwap::new(Arc::new(state)),
            listeners: Mutex::new(Vec::new()),
            key_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Get the current state
    ///
    /// This method is lock-free and safe to call from any thread.
    pub fn get_state(&self) -> Arc<VoiceState> {
        self.state.load_full()
    }

    /// Apply an action through the reducer and notify subscribers
    ///
    /// Subscribers are only notified for keys whose value actually changed;
    /// a dispatch that leaves the state identical notifies nobody. Returns
    /// the keys that changed.
    pub fn dispatch(&self, action: VoiceAction) -> Vec<StateKey> {
        let old = self.state.load_full();
        let new = reduce(&old, &action);
        let changed = changed_keys(&old, &new);
        if changed.is_empty() {
            return changed;
        }

        let new = Arc::new(new);
        self.state.store(Arc::clone(&new));

        tracing::trace!(action = ?action, changed = ?changed, "State dispatched");

        self.notify(&new, &changed);
        changed
    }

    /// Subscribe to every state change
    ///
    /// The returned receiver yields the full state after each change.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Arc<VoiceState>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(tx);
        rx
    }

    /// Subscribe to changes of specific keys
    ///
    /// The sender receives each changed key, and only when that key's value
    /// genuinely changed.
    pub fn subscribe_keys(&self, keys: &[StateKey], tx: mpsc::UnboundedSender<StateKey>) {
        let mut listeners = self
            .key_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        listeners.push(KeyListener {
            keys: keys.to_vec(),
            tx,
        });
    }

    /// Subscribe to changes of a single key
    ///
    /// Convenience wrapper over [`subscribe_keys`](Self::subscribe_keys).
    pub fn subscribe_key(&self, key: StateKey) -> mpsc::UnboundedReceiver<StateKey> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe_keys(&[key], tx);
        rx
    }

    /// Current number of subscribers (full-state plus key-filtered)
    pub fn listener_count(&self) -> usize {
        let full = self.listeners.lock().unwrap_or_else(|e| e.into_inner()).len();
        let keyed = self
            .key_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len();
        full + keyed
    }

    /// Notify subscribers, dropping any whose receiver is gone
    fn notify(&self, state: &Arc<VoiceState>, changed: &[StateKey]) {
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.retain(|tx| tx.send(Arc::clone(state)).is_ok());
        }

        let mut key_listeners = self
            .key_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        key_listeners.retain(|listener| {
            for key in changed {
                if listener.keys.contains(key) && listener.tx.send(*key).is_err() {
                    return false;
                }
            }
            !listener.tx.is_closed()
        });
    }
}

impl Default for VoiceStore {
    fn default() -> Self {
        Self::new()
    }
}
