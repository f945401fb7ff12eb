use serde::{Deserialize, Serialize};

/// Information about one audio input device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device identifier (unique)
    pub id: String,
    /// Human-readable device label
    pub label: String,
    /// Whether this is the default input device
    pub is_default: bool,
}

/// Microphone permission status
///
/// `Denied` is sticky: the engine never attempts to start while denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Prompt,
    Unsupported,
}

/// The single voice state value owned by the store
///
/// `want_listening` is the desired state set by callers; `listening` is the
/// observed state and is only ever written by the engine from recognizer
/// events. Configuration fields (`lang`, `interim_enabled`, `continuous`)
/// changing while listening cause a stop+restart cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceState {
    /// Desired listening state, set by callers
    pub want_listening: bool,

    /// Observed listening state, set only by the engine
    pub listening: bool,

    /// Recognition language tag (e.g. "en-US")
    pub lang: String,

    /// Whether interim (partial) results are requested
    pub interim_enabled: bool,

    /// Whether the recognizer should run in continuous mode
    pub continuous: bool,

    /// Selected input device; clearing to `None` while listening forces a stop
    pub device_id: Option<String>,

    /// Known input devices
    pub device_list: Vec<DeviceInfo>,

    /// Mute flag; `true` forces a stop regardless of `want_listening`
    pub muted: bool,

    /// Microphone permission status
    pub permission: Permission,

    /// Last observed interim transcript fragment
    pub partial_text: String,

    /// Last observed final transcript fragment
    pub final_text: String,

    /// Last recorded diagnostic, if any
    pub last_error: Option<String>,
}

impl Default for VoiceState {
    fn default() -> Self {
        Self {
            want_listening: false,
            listening: false,
            lang: "en-US".to_string(),
            interim_enabled: true,
            continuous: false,
            device_id: None,
            device_list: Vec::new(),
            muted: false,
            permission: Permission::Prompt,
            partial_text: String::new(),
            final_text: String::new(),
            last_error: None,
        }
    }
}

/// Keys of `VoiceState`, used by key-filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StateKey {
    WantListening,
    Listening,
    Lang,
    InterimEnabled,
    Continuous,
    DeviceId,
    DeviceList,
    Muted,
    Permission,
    PartialText,
    FinalText,
    LastError,
}

impl StateKey {
    /// Key name for logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::WantListening => "want_listening",
            Self::Listening => "listening",
            Self::Lang => "lang",
            Self::InterimEnabled => "interim_enabled",
            Self::Continuous => "continuous",
            Self::DeviceId => "device_id",
            Self::DeviceList => "device_list",
            Self::Muted => "muted",
            Self::Permission => "permission",
            Self::PartialText => "partial_text",
            Self::FinalText => "final_text",
            Self::LastError => "last_error",
        }
    }
}

/// Reducer-style state transitions
///
/// The store only mutates `VoiceState` through these actions.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceAction {
    SetWantListening(bool),
    SetListening(bool),
    SetLang(String),
    SetInterimEnabled(bool),
    SetContinuous(bool),
    SetDeviceId(Option<String>),
    SetDeviceList(Vec<DeviceInfo>),
    SetMuted(bool),
    SetPermission(Permission),
    SetPartialText(String),
    SetFinalText(String),
    SetLastError(Option<String>),
    /// Clear both transcript fields
    ClearTranscripts,
}

/// Apply an action to a state value, producing the next state
pub fn reduce(state: &VoiceState, action: &VoiceAction) -> VoiceState {
    let mut next = state.clone();
    match action {
        VoiceAction::SetWantListening(v) => next.want_listening = *v,
        VoiceAction::SetListening(v) => next.listening = *v,
        VoiceAction::SetLang(v) => next.lang = v.clone(),
        VoiceAction::SetInterimEnabled(v) => next.interim_enabled = *v,
        VoiceAction::SetContinuous(v) => next.continuous = *v,
        VoiceAction::SetDeviceId(v) => next.device_id = v.clone(),
        VoiceAction::SetDeviceList(v) => next.device_list = v.clone(),
        VoiceAction::SetMuted(v) => next.muted = *v,
        VoiceAction::SetPermission(v) => next.permission = *v,
        VoiceAction::SetPartialText(v) => next.partial_text = v.clone(),
        VoiceAction::SetFinalText(v) => next.final_text = v.clone(),
        VoiceAction::SetLastError(v) => next.last_error = v.clone(),
        VoiceAction::ClearTranscripts => {
            next.partial_text.clear();
            next.final_text.clear();
        }
    }
    next
}

/// Compute which keys differ between two state values
///
/// Key-filtered subscriptions fire only for keys returned here, so a
/// dispatch that leaves a field unchanged never re-notifies its observers.
pub fn changed_keys(old: &VoiceState, new: &VoiceState) -> Vec<StateKey> {
    let mut keys = Vec::new();
    if old.want_listening != new.want_listening {
        keys.push(StateKey::WantListening);
    }
    if old.listening != new.listening {
        keys.push(StateKey::Listening);
    }
    if old.lang != new.lang {
        keys.push(StateKey::Lang);
    }
    if old.interim_enabled != new.interim_enabled {
        keys.push(StateKey::InterimEnabled);
    }
    if old.continuous != new.continuous {
        keys.push(StateKey::Continuous);
    }
    if old.device_id != new.device_id {
        keys.push(StateKey::DeviceId);
    }
    if old.device_list != new.device_list {
        keys.push(StateKey::DeviceList);
    }
    if old.muted != new.muted {
        keys.push(StateKey::Muted);
    }
    if old.permission != new.permission {
        keys.push(StateKey::Permission);
    }
    if old.partial_text != new.partial_text {
        keys.push(StateKey::PartialText);
    }
    if old.final_text != new.final_text {
        keys.push(StateKey::FinalText);
    }
    if old.last_error != new.last_error {
        keys.push(StateKey::LastError);
    }
    keys
}
