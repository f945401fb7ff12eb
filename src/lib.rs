//! EchoFlow - voice session lifecycle engine
//!
//! Exposes spoken audio as structured, continuously-updated state while
//! shielding callers from the quirks of an external, single-instance,
//! event-driven speech-recognition resource. Callers declare intent by
//! flipping `want_listening` in the [`store::VoiceStore`]; the
//! [`engine::SpeechSessionEngine`] reconciles that intent against the
//! recognizer's actual status, recovers from failed starts, restarts in
//! continuous mode, and guarantees that only one recognizer instance is
//! ever active.

/// Voice state store (single source of truth)
pub mod store;

/// Recognizer capability interface and adapter
pub mod recognizer;

/// Session lifecycle engine
pub mod engine;

/// Device enumeration and permission probes
pub mod devices;

/// Telemetry sink seam
pub mod telemetry;

/// Utility modules
pub mod utils;

pub use engine::{EngineConfig, SpeechSessionEngine};
pub use store::{VoiceAction, VoiceState, VoiceStore};
