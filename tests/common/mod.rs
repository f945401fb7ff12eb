//! Shared test doubles: a scripted recognition backend, its factory, and a
//! capturing telemetry sink. The mock implements the same capability
//! contract as a real backend, including the awkward behaviors the engine
//! must absorb (synchronous start failures, acknowledgements that never
//! arrive, terminal events that never fire).

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use echoflow::engine::{EngineConfig, SpeechSessionEngine};
use echoflow::recognizer::{
    BackendEvent, RecognitionBackend, RecognizerConfig, RecognizerError, RecognizerFactory,
    RecognizerResult, ResultEntry,
};
use echoflow::store::{Permission, VoiceAction, VoiceStore};
use echoflow::telemetry::TelemetrySink;

/// Scripted outcome for one `start()` call
#[derive(Debug, Clone, Copy)]
pub enum StartOutcome {
    /// Succeed and fire the start acknowledgement
    Ack,
    /// Succeed but never fire an acknowledgement
    Silent,
    /// Fail synchronously with this engine code
    Throw(&'static str),
}

/// One constructed backend instance, observable from the test
pub struct MockInstance {
    pub config: RecognizerConfig,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub abort_calls: AtomicUsize,
    tx: Mutex<Option<mpsc::UnboundedSender<BackendEvent>>>,
    end_on_stop: bool,
}

impl MockInstance {
    pub fn emit(&self, event: BackendEvent) {
        let tx = self.tx.lock().unwrap();
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn ack(&self) {
        self.emit(BackendEvent::Started);
    }

    pub fn end(&self) {
        self.emit(BackendEvent::Ended);
    }

    pub fn error(&self, code: &str) {
        self.emit(BackendEvent::Error {
            code: code.to_string(),
        });
    }

    pub fn results(&self, entries: &[(&str, bool)], start_index: Option<usize>) {
        self.emit(BackendEvent::Result {
            entries: entries
                .iter()
                .map(|(text, is_final)| {
                    if *is_final {
                        ResultEntry::final_(*text)
                    } else {
                        ResultEntry::interim(*text)
                    }
                })
                .collect(),
            start_index,
        });
    }

    pub fn started(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }
}

/// Shared record of every instance the factory produced
pub struct MockRecognizers {
    pub instances: Mutex<Vec<Arc<MockInstance>>>,
    script: Mutex<VecDeque<StartOutcome>>,
    end_on_stop: bool,
}

impl MockRecognizers {
    pub fn new(end_on_stop: bool) -> Arc<Self> {
        Arc::new(Self {
            instances: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            end_on_stop,
        })
    }

    /// Queue outcomes consumed by successive `start()` calls, across
    /// instances; an empty script defaults to `Ack`
    pub fn script(&self, outcomes: &[StartOutcome]) {
        self.script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub fn count(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn instance(&self, index: usize) -> Arc<MockInstance> {
        Arc::clone(&self.instances.lock().unwrap()[index])
    }

    pub fn last(&self) -> Arc<MockInstance> {
        let instances = self.instances.lock().unwrap();
        Arc::clone(instances.last().expect("no instance constructed"))
    }
}

struct MockBackend {
    shared: Arc<MockRecognizers>,
    instance: Arc<MockInstance>,
}

impl RecognitionBackend for MockBackend {
    fn bind(&mut self, tx: mpsc::UnboundedSender<BackendEvent>) {
        *self.instance.tx.lock().unwrap() = Some(tx);
    }

    fn start(&mut self) -> RecognizerResult<()> {
        self.instance.start_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StartOutcome::Ack);
        match outcome {
            StartOutcome::Ack => {
                self.instance.ack();
                Ok(())
            }
            StartOutcome::Silent => Ok(()),
            StartOutcome::Throw(code) => Err(RecognizerError::StartFailed {
                code: code.to_string(),
            }),
        }
    }

    fn stop(&mut self) {
        self.instance.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.instance.end_on_stop {
            self.instance.end();
        }
    }

    fn abort(&mut self) {
        self.instance.abort_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out scripted instances
pub struct MockFactory {
    shared: Arc<MockRecognizers>,
}

impl MockFactory {
    pub fn new(shared: Arc<MockRecognizers>) -> Self {
        Self { shared }
    }
}

impl RecognizerFactory for MockFactory {
    fn create(&mut self, config: &RecognizerConfig) -> RecognizerResult<Box<dyn RecognitionBackend>> {
        let instance = Arc::new(MockInstance {
            config: config.clone(),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            abort_calls: AtomicUsize::new(0),
            tx: Mutex::new(None),
            end_on_stop: self.shared.end_on_stop,
        });
        self.shared
            .instances
            .lock()
            .unwrap()
            .push(Arc::clone(&instance));
        Ok(Box::new(MockBackend {
            shared: Arc::clone(&self.shared),
            instance,
        }))
    }
}

/// Telemetry sink that records every emission
#[derive(Default)]
pub struct CapturingSink {
    pub events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl TelemetrySink for CapturingSink {
    fn emit(&self, event: &str, props: serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), props));
    }
}

impl CapturingSink {
    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }
}

/// A store, engine and scripted recognizers wired together
pub struct Fixture {
    pub store: Arc<VoiceStore>,
    pub recognizers: Arc<MockRecognizers>,
    pub telemetry: Arc<CapturingSink>,
    pub engine: SpeechSessionEngine,
}

impl Fixture {
    /// Fresh fixture with device and permission already granted
    pub fn new(end_on_stop: bool) -> Self {
        Self::with_config(end_on_stop, EngineConfig::default())
    }

    pub fn with_config(end_on_stop: bool, config: EngineConfig) -> Self {
        let store = Arc::new(VoiceStore::new());
        store.dispatch(VoiceAction::SetDeviceId(Some("default-mic".to_string())));
        store.dispatch(VoiceAction::SetPermission(Permission::Granted));

        let recognizers = MockRecognizers::new(end_on_stop);
        let telemetry = Arc::new(CapturingSink::default());
        let engine = SpeechSessionEngine::spawn(
            Arc::clone(&store),
            Box::new(MockFactory::new(Arc::clone(&recognizers))),
            Arc::clone(&telemetry) as Arc<dyn TelemetrySink>,
            config,
        );

        Self {
            store,
            recognizers,
            telemetry,
            engine,
        }
    }

    pub fn want(&self, listening: bool) {
        self.store
            .dispatch(VoiceAction::SetWantListening(listening));
    }
}

/// Let the engine loop drain queued events (paused-clock tests auto-advance)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
