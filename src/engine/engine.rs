use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::termination::{await_termination, PendingTermination, TerminationCoordinator};
use crate::recognizer::{
    AdapterEvent, AdapterSignal, RecognizerAdapter, RecognizerConfig, RecognizerError,
    RecognizerFactory,
};
use crate::store::{Permission, StateKey, VoiceAction, VoiceState, VoiceStore};
use crate::telemetry::TelemetrySink;

/// Store keys whose changes trigger a reconciliation pass
const RECONCILE_KEYS: [StateKey; 7] = [
    StateKey::WantListening,
    StateKey::Muted,
    StateKey::DeviceId,
    StateKey::Permission,
    StateKey::Lang,
    StateKey::InterimEnabled,
    StateKey::Continuous,
];

/// Engine lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnginePhase {
    /// No recognizer held, nothing in flight
    Idle,
    /// A start was issued, awaiting the acknowledgement
    Starting,
    /// A session is open
    Listening,
    /// A teardown wait is in flight
    Stopping,
}

impl EnginePhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Starting)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, Self::Listening)
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    /// Phase name for logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting => "Starting",
            Self::Listening => "Listening",
            Self::Stopping => "Stopping",
        }
    }
}

/// Control events delivered to the engine task
#[derive(Debug)]
enum ControlEvent {
    /// A teardown wait resolved (terminal event or timeout)
    TerminationResolved {
        pending: PendingTermination,
        timed_out: bool,
    },
    /// Stop the engine; `done` is signalled once teardown finished
    Shutdown { done: Option<oneshot::Sender<()>> },
}

/// One input to the engine loop
enum Input {
    Key(StateKey),
    Adapter(AdapterSignal),
    Control(ControlEvent),
}

/// Handle to a running speech session engine
///
/// The engine itself is an actor task: it owns the recognizer handle, and
/// all of its logic runs on one event loop, never concurrently with itself.
/// Callers drive it exclusively through the store (flipping
/// `want_listening`, muting, changing configuration); this handle only
/// exists for lifecycle management and observation.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use echoflow::engine::{EngineConfig, SpeechSessionEngine};
/// use echoflow::store::{VoiceAction, VoiceStore};
/// use echoflow::telemetry::NullSink;
///
/// # fn factory() -> Box<dyn echoflow::recognizer::RecognizerFactory> { unimplemented!() }
/// # #[tokio::main]
/// # async fn main() {
/// let store = Arc::new(VoiceStore::new());
/// let engine = SpeechSessionEngine::spawn(
///     Arc::clone(&store),
///     factory(),
///     Arc::new(NullSink),
///     EngineConfig::default(),
/// );
///
/// store.dispatch(VoiceAction::SetWantListening(true));
/// # drop(engine);
/// # }
/// ```
pub struct SpeechSessionEngine {
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    phase_rx: watch::Receiver<EnginePhase>,
    task: Option<JoinHandle<()>>,
}

impl SpeechSessionEngine {
    /// Spawn the engine task
    ///
    /// Subscribes to the reconciliation-relevant store keys and starts the
    /// actor loop. The engine holds no durable state of its own; everything
    /// observable lives in the store.
    pub fn spawn(
        store: Arc<VoiceStore>,
        factory: Box<dyn RecognizerFactory>,
        telemetry: Arc<dyn TelemetrySink>,
        config: EngineConfig,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (adapter_tx, adapter_rx) = mpsc::unbounded_channel();
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(EnginePhase::Idle);

        store.subscribe_keys(&RECONCILE_KEYS, key_tx);

        let task = EngineTask {
            store,
            factory,
            telemetry,
            config,
            control_rx,
            control_tx: control_tx.clone(),
            key_rx,
            adapter_rx,
            adapter_tx,
            adapter: None,
            phase_tx,
            coordinator: TerminationCoordinator::new(),
            pending: None,
            start_attempts: 0,
            instance_seq: 0,
            shutting_down: false,
            shutdown_ack: None,
        };

        let handle = tokio::spawn(task.run());
        info!("Speech session engine started");

        Self {
            control_tx,
            phase_rx,
            task: Some(handle),
        }
    }

    /// Current engine phase
    pub fn phase(&self) -> EnginePhase {
        *self.phase_rx.borrow()
    }

    /// Watch for phase changes
    pub fn phase_watch(&self) -> watch::Receiver<EnginePhase> {
        self.phase_rx.clone()
    }

    /// Stop the engine, tearing down any active recognizer
    pub async fn shutdown(&mut self) -> EngineResult<()> {
        let task = self.task.take().ok_or(EngineError::NotRunning)?;

        let (done_tx, done_rx) = oneshot::channel();
        self.control_tx
            .send(ControlEvent::Shutdown {
                done: Some(done_tx),
            })
            .map_err(|_| EngineError::ChannelClosed)?;

        let _ = done_rx.await;
        let _ = task.await;
        Ok(())
    }
}

impl Drop for SpeechSessionEngine {
    fn drop(&mut self) {
        // Best-effort stop signal if shutdown was never awaited.
        if self.task.is_some() {
            let _ = self.control_tx.send(ControlEvent::Shutdown { done: None });
        }
    }
}

/// The engine actor
struct EngineTask {
    store: Arc<VoiceStore>,
    factory: Box<dyn RecognizerFactory>,
    telemetry: Arc<dyn TelemetrySink>,
    config: EngineConfig,

    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    control_tx: mpsc::UnboundedSender<ControlEvent>,
    key_rx: mpsc::UnboundedReceiver<StateKey>,
    adapter_rx: mpsc::UnboundedReceiver<AdapterSignal>,
    adapter_tx: mpsc::UnboundedSender<AdapterSignal>,

    /// The single recognizer handle; invariant: at most one is ever held
    adapter: Option<RecognizerAdapter>,
    phase_tx: watch::Sender<EnginePhase>,
    coordinator: TerminationCoordinator,
    /// In-flight teardown wait, if any; a start request defers until it
    /// resolves or is superseded
    pending: Option<PendingTermination>,
    /// Consecutive start attempts in the current reconciliation pass
    start_attempts: u32,
    instance_seq: u64,
    shutting_down: bool,
    shutdown_ack: Option<oneshot::Sender<()>>,
}

impl EngineTask {
    async fn run(mut self) {
        loop {
            let input = tokio::select! {
                Some(key) = self.key_rx.recv() => Input::Key(key),
                Some(signal) = self.adapter_rx.recv() => Input::Adapter(signal),
                Some(control) = self.control_rx.recv() => Input::Control(control),
                else => break,
            };

            let mut dirty = self.apply(input);

            // Coalesce: drain everything already queued so a batch of
            // same-tick changes produces at most one stop+start cycle,
            // evaluated against the final state values.
            loop {
                let next = if let Ok(key) = self.key_rx.try_recv() {
                    Input::Key(key)
                } else if let Ok(signal) = self.adapter_rx.try_recv() {
                    Input::Adapter(signal)
                } else if let Ok(control) = self.control_rx.try_recv() {
                    Input::Control(control)
                } else {
                    break;
                };
                dirty |= self.apply(next);
            }

            if self.shutting_down {
                self.finish();
                break;
            }

            if dirty {
                self.reconcile();
            }
        }

        info!("Speech session engine stopped");
    }

    /// Apply one input; returns whether a reconciliation pass is needed
    fn apply(&mut self, input: Input) -> bool {
        match input {
            Input::Key(key) => {
                trace!(key = key.name(), "Store key changed");
                // A caller-driven change opens a fresh reconciliation pass.
                self.start_attempts = 0;
                true
            }
            Input::Adapter(signal) => self.handle_signal(signal),
            Input::Control(ControlEvent::TerminationResolved { pending, timed_out }) => {
                self.handle_termination_resolved(pending, timed_out)
            }
            Input::Control(ControlEvent::Shutdown { done }) => {
                self.shutting_down = true;
                self.shutdown_ack = done;
                false
            }
        }
    }

    fn handle_termination_resolved(&mut self, pending: PendingTermination, timed_out: bool) -> bool {
        if !self.coordinator.is_current(&pending) {
            debug!(
                target = pending.target,
                generation = pending.generation,
                "Ignoring superseded teardown resolution"
            );
            return false;
        }

        if timed_out {
            warn!(
                target = pending.target,
                "Teardown wait timed out; treating instance as terminated"
            );
        } else {
            debug!(target = pending.target, "Teardown confirmed");
        }

        self.coordinator.forget(pending.target);
        self.pending = None;
        if self.adapter.is_none() {
            self.set_phase(EnginePhase::Idle);
        }
        true
    }

    /// Process an adapter signal; signals from stale instances never
    /// mutate state
    fn handle_signal(&mut self, signal: AdapterSignal) -> bool {
        let current = self.adapter.as_ref().map(RecognizerAdapter::instance_id);
        if current != Some(signal.instance) {
            debug!(instance = signal.instance, "Dropping signal from stale instance");
            return false;
        }

        match signal.event {
            AdapterEvent::SessionStarted { session_id } => {
                debug!(instance = signal.instance, session_id = %session_id, "Session opened");
                self.set_phase(EnginePhase::Listening);
                self.start_attempts = 0;
                self.store.dispatch(VoiceAction::SetPartialText(String::new()));
                self.store.dispatch(VoiceAction::SetListening(true));
                self.telemetry.emit(
                    "session_started",
                    json!({ "session_id": session_id, "instance": signal.instance }),
                );
                false
            }
            AdapterEvent::Interim { text } => {
                trace!(text = %text, "Interim transcript");
                self.store.dispatch(VoiceAction::SetPartialText(text.clone()));
                self.telemetry
                    .emit("interim_transcript", json!({ "chars": text.len() }));
                false
            }
            AdapterEvent::Final { text } => {
                debug!(text = %text, "Final transcript");
                self.store.dispatch(VoiceAction::SetFinalText(text.clone()));
                self.telemetry
                    .emit("final_transcript", json!({ "chars": text.len() }));
                false
            }
            AdapterEvent::FatalError { code } => {
                warn!(code = %code, "Recognizer denied permission");
                self.store
                    .dispatch(VoiceAction::SetPermission(Permission::Denied));
                self.store.dispatch(VoiceAction::SetLastError(Some(format!(
                    "Recognition error: {code}"
                ))));
                self.telemetry
                    .emit("recognition_error", json!({ "code": code, "fatal": true }));
                self.begin_teardown();
                true
            }
            AdapterEvent::TransientError { code } => {
                self.store.dispatch(VoiceAction::SetLastError(Some(format!(
                    "Recognition error: {code}"
                ))));
                self.telemetry
                    .emit("recognition_error", json!({ "code": code, "fatal": false }));
                false
            }
            AdapterEvent::Ended { session_id } => self.handle_ended(signal.instance, session_id),
        }
    }

    /// Terminal end from the currently-held instance
    fn handle_ended(&mut self, instance: u64, session_id: Option<String>) -> bool {
        self.store.dispatch(VoiceAction::SetListening(false));
        self.telemetry.emit(
            "session_ended",
            json!({ "session_id": session_id, "instance": instance }),
        );

        let state = self.store.get_state();
        let restart = state.continuous && state.want_listening && gate_open(&state);

        if restart {
            if let Some(mut adapter) = self.adapter.take() {
                let want_config = RecognizerConfig::from_state(&state);
                if adapter.config() == &want_config {
                    debug!(instance, "Continuous mode restart");
                    self.set_phase(EnginePhase::Starting);
                    self.start_attempts = 1;
                    match adapter.start() {
                        Ok(()) => {
                            self.telemetry
                                .emit("session_restarted", json!({ "instance": instance }));
                            self.adapter = Some(adapter);
                            return false;
                        }
                        Err(err) => {
                            self.handle_start_failure(adapter, err);
                            return true;
                        }
                    }
                }
                // Configuration drifted while the session was running; tear
                // the instance down and let reconciliation rebuild it.
                self.teardown_adapter(adapter);
            }
            return true;
        }

        // Not restarting: the terminal event already fired, so the instance
        // can be released without a teardown wait. A one-shot session ending
        // naturally does not re-trigger a start on its own; reconciliation
        // runs on store key changes, and `want_listening` is left untouched.
        if let Some(adapter) = self.adapter.take() {
            self.coordinator.forget(adapter.instance_id());
        }
        self.set_phase(EnginePhase::Idle);
        false
    }

    /// Reconcile desired state against the recognizer's actual status
    fn reconcile(&mut self) {
        let state = self.store.get_state();
        let should_listen = state.want_listening && gate_open(&state);

        if !should_listen {
            if self.adapter.is_some() {
                debug!(
                    want = state.want_listening,
                    muted = state.muted,
                    permission = ?state.permission,
                    has_device = state.device_id.is_some(),
                    "Stopping recognizer"
                );
                self.begin_teardown();
            } else if self.pending.is_none() {
                self.set_phase(EnginePhase::Idle);
            }
            return;
        }

        if let Some(adapter) = &self.adapter {
            let want_config = RecognizerConfig::from_state(&state);
            if adapter.config() != &want_config {
                debug!("Configuration changed; restarting recognizer");
                self.begin_teardown();
                // Reconciliation after the teardown resolves performs the
                // start with the configuration read at that point.
            }
            return;
        }

        if self.pending.is_some() {
            // A teardown wait is in flight and not superseded; the start
            // proceeds once it resolves.
            trace!("Start deferred until teardown resolves");
            return;
        }

        self.start_recognizer(&state);
    }

    /// Construct one instance and issue its start
    fn start_recognizer(&mut self, state: &VoiceState) {
        if self.start_attempts >= self.config.max_start_attempts {
            // Recovery exhausted for this reconciliation pass; a fresh
            // caller-driven change resets the counter.
            return;
        }
        self.start_attempts += 1;

        let config = RecognizerConfig::from_state(state);
        let backend = match self.factory.create(&config) {
            Ok(backend) => backend,
            Err(err) => {
                warn!(error = %err, "Recognition backend unavailable");
                self.store
                    .dispatch(VoiceAction::SetLastError(Some(err.to_string())));
                self.set_phase(EnginePhase::Idle);
                return;
            }
        };

        self.instance_seq += 1;
        let instance = self.instance_seq;
        let mut adapter =
            RecognizerAdapter::bind(instance, backend, config, self.adapter_tx.clone());

        debug!(instance, attempt = self.start_attempts, "Starting recognizer");
        self.set_phase(EnginePhase::Starting);

        match adapter.start() {
            Ok(()) => {
                self.adapter = Some(adapter);
            }
            Err(err) => self.handle_start_failure(adapter, err),
        }
    }

    /// A `start()` call failed synchronously
    fn handle_start_failure(&mut self, adapter: RecognizerAdapter, err: RecognizerError) {
        warn!(
            error = %err,
            attempt = self.start_attempts,
            "Recognizer start failed"
        );
        self.store
            .dispatch(VoiceAction::SetLastError(Some(err.to_string())));
        self.telemetry.emit(
            "start_failed",
            json!({ "attempt": self.start_attempts, "code": err.code() }),
        );

        if err.is_permission() {
            self.store
                .dispatch(VoiceAction::SetPermission(Permission::Denied));
            self.start_attempts = self.config.max_start_attempts;
        }

        // Tear the failed instance down through the coordinator; when the
        // wait resolves, reconciliation performs the one-shot recovery
        // retry (unless attempts are exhausted or the gate closed).
        self.teardown_adapter(adapter);
    }

    /// Release the held instance and begin its teardown wait
    fn begin_teardown(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            if self.store.get_state().listening {
                self.store.dispatch(VoiceAction::SetListening(false));
            }
            self.teardown_adapter(adapter);
        }
    }

    /// Ask an instance to terminate and wait, bounded, off the engine loop
    ///
    /// The held reference is already nulled by the time this runs, so a
    /// start request arriving meanwhile sees "no recognizer held"; it still
    /// defers on `pending` until the wait resolves or is superseded.
    fn teardown_adapter(&mut self, mut adapter: RecognizerAdapter) {
        let instance = adapter.instance_id();
        let pending = self.coordinator.begin(instance);
        self.pending = Some(pending);
        self.set_phase(EnginePhase::Stopping);

        if self.config.abort_before_stop {
            adapter.abort();
        }
        adapter.stop();

        debug!(
            instance,
            generation = pending.generation,
            "Teardown wait started"
        );

        let terminal = adapter.terminal_watch();
        let timeout = self.config.termination_timeout();
        let control_tx = self.control_tx.clone();
        tokio::spawn(async move {
            let timed_out = await_termination(terminal, timeout).await;
            // The instance stays alive until its wait resolves.
            drop(adapter);
            let _ = control_tx.send(ControlEvent::TerminationResolved { pending, timed_out });
        });
    }

    /// Synchronous best-effort teardown on shutdown
    fn finish(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.abort();
            adapter.stop();
            if self.store.get_state().listening {
                self.store.dispatch(VoiceAction::SetListening(false));
            }
        }
        self.set_phase(EnginePhase::Idle);
        if let Some(ack) = self.shutdown_ack.take() {
            let _ = ack.send(());
        }
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                false
            } else {
                trace!(from = current.name(), to = phase.name(), "Phase change");
                *current = phase;
                true
            }
        });
    }
}

/// Whether the gating conditions allow a start
fn gate_open(state: &VoiceState) -> bool {
    state.permission != Permission::Denied && !state.muted && state.device_id.is_some()
}
