use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use super::backend::{classify_error, BackendEvent, ErrorClass, RecognitionBackend, RecognizerConfig, ResultEntry};
use super::error::RecognizerResult;
use super::session::Session;

/// Events forwarded by the adapter after extraction and de-duplication
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// A session opened on a start acknowledgement
    SessionStarted { session_id: String },

    /// Interim text differing from the last forwarded interim text
    Interim { text: String },

    /// Final text differing from the last forwarded final text
    Final { text: String },

    /// Permission-denied-class error
    FatalError { code: String },

    /// Any other resource error
    TransientError { code: String },

    /// The instance reached its terminal end
    Ended { session_id: Option<String> },
}

/// An adapter event tagged with the emitting instance
///
/// The engine drops signals from instances it no longer holds, so a stale
/// instance winding down can never mutate a newer session's state.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSignal {
    pub instance: u64,
    pub event: AdapterEvent,
}

/// Binds one recognizer instance's events onto the engine
///
/// Owns the backend handle and the ephemeral [`Session`]. Raw backend events
/// are processed on a dedicated task: batch extraction from the session
/// cursor, whitespace normalization, interim/final classification and
/// de-duplication all happen here, so the engine only ever sees text worth
/// dispatching. The adapter owns no policy: whether to restart or tear down
/// is the engine's decision.
pub struct RecognizerAdapter {
    instance_id: u64,
    config: RecognizerConfig,
    backend: Box<dyn RecognitionBackend>,
    terminal_rx: watch::Receiver<bool>,
}

impl RecognizerAdapter {
    /// Bind a backend instance and start pumping its events
    ///
    /// The pump task lives until the backend's event channel closes; it is
    /// deliberately not tied to the adapter's lifetime so that late events
    /// from a released instance still reach the engine (which ignores them
    /// by instance id) instead of vanishing mid-flight.
    pub fn bind(
        instance_id: u64,
        mut backend: Box<dyn RecognitionBackend>,
        config: RecognizerConfig,
        out: mpsc::UnboundedSender<AdapterSignal>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        backend.bind(event_tx);

        let (terminal_tx, terminal_rx) = watch::channel(false);
        tokio::spawn(pump(instance_id, event_rx, out, terminal_tx));

        Self {
            instance_id,
            config,
            backend,
            terminal_rx,
        }
    }

    /// The instance id assigned by the engine
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// The configuration this instance was constructed with
    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Ask the resource to start
    ///
    /// A synchronous failure is surfaced immediately rather than waiting for
    /// an error event that will never fire.
    pub fn start(&mut self) -> RecognizerResult<()> {
        self.backend.start()
    }

    /// Ask the resource to stop
    pub fn stop(&mut self) {
        self.backend.stop();
    }

    /// Ask the resource to cancel immediately
    pub fn abort(&mut self) {
        self.backend.abort();
    }

    /// Watch that flips true when a terminal (or terminal-equivalent error)
    /// event fires; the termination coordinator waits on this
    pub fn terminal_watch(&self) -> watch::Receiver<bool> {
        self.terminal_rx.clone()
    }
}

/// Event pump for one backend instance
async fn pump(
    instance: u64,
    mut events: mpsc::UnboundedReceiver<BackendEvent>,
    out: mpsc::UnboundedSender<AdapterSignal>,
    terminal_tx: watch::Sender<bool>,
) {
    let mut session: Option<Session> = None;

    let forward = |event: AdapterEvent| {
        let _ = out.send(AdapterSignal { instance, event });
    };

    while let Some(event) = events.recv().await {
        match event {
            BackendEvent::Started => {
                let opened = Session::open();
                let session_id = opened.session_id.clone();
                session = Some(opened);
                // A restart on the same instance reuses this pump; the
                // terminal flag belongs to the previous cycle.
                let _ = terminal_tx.send(false);
                forward(AdapterEvent::SessionStarted { session_id });
            }
            BackendEvent::Result {
                entries,
                start_index,
            } => {
                // Some implementations never fire a start acknowledgement;
                // open a session implicitly so results are not dropped.
                let open = session.get_or_insert_with(|| {
                    debug!(instance, "Result batch before start ack, opening session");
                    let opened = Session::open();
                    forward(AdapterEvent::SessionStarted {
                        session_id: opened.session_id.clone(),
                    });
                    opened
                });

                for event in consume_batch(open, &entries, start_index) {
                    forward(event);
                }
            }
            BackendEvent::Error { code } => {
                // An error usually precedes the terminal end; a teardown
                // wait may also resolve on it when the end never arrives.
                let _ = terminal_tx.send(true);
                match classify_error(&code) {
                    ErrorClass::FatalPermission => {
                        warn!(instance, code = %code, "Fatal permission error");
                        forward(AdapterEvent::FatalError { code });
                    }
                    ErrorClass::Transient => {
                        debug!(instance, code = %code, "Transient recognizer error");
                        forward(AdapterEvent::TransientError { code });
                    }
                }
            }
            BackendEvent::Ended => {
                let session_id = session.take().map(|mut s| {
                    s.close();
                    s.session_id
                });
                let _ = terminal_tx.send(true);
                forward(AdapterEvent::Ended { session_id });
            }
        }
    }

    trace!(instance, "Adapter pump finished");
}

/// Extract new text from a result batch and advance the session cursor
///
/// Only entries from `max(cursor, start_index)` onward are considered. The
/// cursor advances past final entries only: interim entries are routinely
/// re-reported in place, growing until the resource promotes them to final
/// at the same index, so they stay re-extractable and the
/// `last_interim`/`last_final` comparison absorbs the repeats.
/// Same-classification entries are concatenated, whitespace-normalized, and
/// forwarded only when the text differs from the last forwarded value of
/// that classification.
fn consume_batch(
    session: &mut Session,
    entries: &[ResultEntry],
    start_index: Option<usize>,
) -> Vec<AdapterEvent> {
    let begin = session.cursor.max(start_index.unwrap_or(0));
    let mut events = Vec::new();

    if begin < entries.len() {
        let mut interim_parts: Vec<&str> = Vec::new();
        let mut final_parts: Vec<&str> = Vec::new();
        let mut last_final_index = None;
        for (offset, entry) in entries[begin..].iter().enumerate() {
            if entry.is_final {
                final_parts.push(&entry.text);
                last_final_index = Some(begin + offset);
            } else {
                interim_parts.push(&entry.text);
            }
        }

        let final_text = normalize(&final_parts);
        if !final_text.is_empty() && session.last_final.as_ref() != Some(&final_text) {
            session.last_final = Some(final_text.clone());
            events.push(AdapterEvent::Final { text: final_text });
        }

        let interim_text = normalize(&interim_parts);
        if !interim_text.is_empty() && session.last_interim.as_ref() != Some(&interim_text) {
            session.last_interim = Some(interim_text.clone());
            events.push(AdapterEvent::Interim { text: interim_text });
        }

        if let Some(index) = last_final_index {
            session.cursor = session.cursor.max(index + 1);
        }
    }

    events
}

/// Join text fragments and collapse runs of whitespace
fn normalize(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(entries: &[(&str, bool)]) -> Vec<ResultEntry> {
        entries
            .iter()
            .map(|(text, is_final)| ResultEntry {
                text: text.to_string(),
                is_final: *is_final,
            })
            .collect()
    }

    #[test]
    fn test_consume_batch_classifies_and_normalizes() {
        let mut session = Session::open();
        let entries = batch(&[("  hello ", false), ("world ", false), (" done. ", true)]);

        let events = consume_batch(&mut session, &entries, None);
        assert_eq!(
            events,
            vec![
                AdapterEvent::Final {
                    text: "done.".to_string()
                },
                AdapterEvent::Interim {
                    text: "hello world".to_string()
                },
            ]
        );
        assert_eq!(session.cursor, 3);
    }

    #[test]
    fn test_consume_batch_dedupes_identical_text() {
        let mut session = Session::open();
        let entries = batch(&[("hello", false)]);

        let first = consume_batch(&mut session, &entries, Some(0));
        assert_eq!(first.len(), 1);

        // A duplicate batch re-reporting the same entry from index 0.
        let second = consume_batch(&mut session, &entries, Some(0));
        assert!(second.is_empty());
    }

    #[test]
    fn test_consume_batch_follows_in_place_interim_growth() {
        let mut session = Session::open();

        let events = consume_batch(&mut session, &batch(&[("turn", false)]), Some(0));
        assert_eq!(
            events,
            vec![AdapterEvent::Interim {
                text: "turn".to_string()
            }]
        );

        // The resource grows the same entry in place, then promotes it.
        let events = consume_batch(&mut session, &batch(&[("turn left", false)]), Some(0));
        assert_eq!(
            events,
            vec![AdapterEvent::Interim {
                text: "turn left".to_string()
            }]
        );

        let events = consume_batch(&mut session, &batch(&[("turn left now", true)]), Some(0));
        assert_eq!(
            events,
            vec![AdapterEvent::Final {
                text: "turn left now".to_string()
            }]
        );
        assert_eq!(session.cursor, 1);
    }

    #[test]
    fn test_consume_batch_respects_cursor() {
        let mut session = Session::open();
        let entries = batch(&[("one", true), ("two", true)]);

        consume_batch(&mut session, &entries, None);
        assert_eq!(session.cursor, 2);

        // The resource re-sends the full list plus one new entry.
        let entries = batch(&[("one", true), ("two", true), ("three", true)]);
        let events = consume_batch(&mut session, &entries, None);
        assert_eq!(
            events,
            vec![AdapterEvent::Final {
                text: "three".to_string()
            }]
        );
        assert_eq!(session.cursor, 3);
    }

    #[test]
    fn test_consume_batch_uses_reported_start_index() {
        let mut session = Session::open();
        let entries = batch(&[("stale", true), ("fresh", true)]);

        let events = consume_batch(&mut session, &entries, Some(1));
        assert_eq!(
            events,
            vec![AdapterEvent::Final {
                text: "fresh".to_string()
            }]
        );
    }

    #[test]
    fn test_consume_batch_past_end_is_empty() {
        let mut session = Session::open();
        session.cursor = 5;
        let entries = batch(&[("old", true)]);

        let events = consume_batch(&mut session, &entries, None);
        assert!(events.is_empty());
        assert_eq!(session.cursor, 5);
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize(&["  a  b ", " c"]), "a b c");
        assert_eq!(normalize(&[]), "");
        assert_eq!(normalize(&["   "]), "");
    }
}
