use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::RecognizerResult;
use crate::store::VoiceState;

/// Recognizer configuration, applied at construction time only
///
/// Changing any of these mid-session requires a new instance, not mutation;
/// the engine detects drift against the store and restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    /// Recognition language tag
    pub lang: String,
    /// Whether interim results are requested
    pub interim_enabled: bool,
    /// Whether the recognizer runs in continuous mode
    pub continuous: bool,
}

impl RecognizerConfig {
    /// Read the configuration out of the current store state
    pub fn from_state(state: &VoiceState) -> Self {
        Self {
            lang: state.lang.clone(),
            interim_enabled: state.interim_enabled,
            continuous: state.continuous,
        }
    }
}

/// One entry of a recognition result batch
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    /// Recognized text
    pub text: String,
    /// Whether this entry is final (as opposed to interim)
    pub is_final: bool,
}

impl ResultEntry {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Raw events emitted by a recognition backend instance
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// The instance acknowledged a start
    Started,

    /// A result batch; `entries` is the full result list as reported by the
    /// resource, `start_index` the batch's own reported start position
    Result {
        entries: Vec<ResultEntry>,
        start_index: Option<usize>,
    },

    /// The instance reported an error with the given code
    Error { code: String },

    /// The instance reached its terminal end
    Ended,
}

/// Capability contract for one concrete recognizer instance
///
/// `start()` may fail synchronously and may or may not later fire a start
/// acknowledgement. `stop()` and `abort()` are idempotent and may fire the
/// terminal event asynchronously or not at all; the termination coordinator
/// bounds the wait.
pub trait RecognitionBackend: Send {
    /// Bind the event sender this instance reports through
    ///
    /// Called exactly once, before `start()`.
    fn bind(&mut self, tx: mpsc::UnboundedSender<BackendEvent>);

    /// Ask the resource to start recognizing
    fn start(&mut self) -> RecognizerResult<()>;

    /// Ask the resource to stop, letting pending results flush
    fn stop(&mut self);

    /// Ask the resource to cancel immediately
    fn abort(&mut self);
}

/// Constructs recognition backend instances
///
/// Each start (and restart with changed configuration) goes through the
/// factory so that exactly one instance exists per logical attempt. Tests
/// supply a scripted factory; production supplies one bound to the host's
/// recognition resource.
pub trait RecognizerFactory: Send {
    fn create(&mut self, config: &RecognizerConfig) -> RecognizerResult<Box<dyn RecognitionBackend>>;
}

/// Classification of recognizer error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Permission-denied-class code; sets permission to denied and halts
    /// further automatic start attempts
    FatalPermission,
    /// Any other resource error; recorded but does not alter permission
    Transient,
}

/// Classify a recognizer error code as fatal (permission) or transient
pub fn classify_error(code: &str) -> ErrorClass {
    match code {
        "not-allowed" | "service-not-allowed" | "permission-denied" => ErrorClass::FatalPermission,
        _ => ErrorClass::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_state() {
        let mut state = VoiceState::default();
        state.lang = "sv-SE".to_string();
        state.continuous = true;
        state.interim_enabled = false;

        let config = RecognizerConfig::from_state(&state);
        assert_eq!(config.lang, "sv-SE");
        assert!(config.continuous);
        assert!(!config.interim_enabled);
    }

    #[test]
    fn test_classify_permission_codes() {
        assert_eq!(classify_error("not-allowed"), ErrorClass::FatalPermission);
        assert_eq!(
            classify_error("service-not-allowed"),
            ErrorClass::FatalPermission
        );
        assert_eq!(
            classify_error("permission-denied"),
            ErrorClass::FatalPermission
        );
    }

    #[test]
    fn test_classify_transient_codes() {
        assert_eq!(classify_error("no-speech"), ErrorClass::Transient);
        assert_eq!(classify_error("network"), ErrorClass::Transient);
        assert_eq!(classify_error("audio-capture"), ErrorClass::Transient);
        assert_eq!(classify_error("aborted"), ErrorClass::Transient);
        assert_eq!(classify_error(""), ErrorClass::Transient);
    }

    #[test]
    fn test_result_entry_helpers() {
        let interim = ResultEntry::interim("hel");
        assert!(!interim.is_final);

        let final_ = ResultEntry::final_("hello");
        assert!(final_.is_final);
        assert_eq!(final_.text, "hello");
    }
}
