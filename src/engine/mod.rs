//! Speech session engine
//!
//! The orchestrator: reacts to store changes, drives recognizer instance
//! creation and teardown through the termination coordinator, and implements
//! the retry and continuous-restart policy. Callers never talk to the engine
//! directly; they flip `want_listening` in the store and observe the
//! `listening` fact the engine maintains.
//!
//! # Module structure
//!
//! - `engine` - the engine actor and its public handle
//! - `termination` - generation-token teardown bookkeeping
//! - `config` - engine configuration
//! - `error` - engine handle errors

mod config;
#[allow(clippy::module_inception)]
mod engine;
mod error;
mod termination;

pub use config::{EngineConfig, DEFAULT_MAX_START_ATTEMPTS, DEFAULT_TERMINATION_TIMEOUT_MS};
pub use engine::{EnginePhase, SpeechSessionEngine};
pub use error::{EngineError, EngineResult};
pub use termination::{await_termination, PendingTermination, TerminationCoordinator};
