//! Recognizer capability interface and adapter
//!
//! The recognition resource is external, single-instance and event-driven,
//! and its behavior varies across implementations: some never fire a start
//! acknowledgement, some fail synchronously from `start()`, some emit
//! overlapping or duplicate result batches. This module wraps one concrete
//! instance behind a small capability trait and an adapter that turns its
//! raw events into a clean, de-duplicated stream.
//!
//! # Module structure
//!
//! - `backend` - the `RecognitionBackend` capability trait, configuration
//!   and error-code classification
//! - `session` - the ephemeral per-start `Session` record
//! - `adapter` - binds one instance's events, owns the session
//! - `error` - recognizer error types

mod adapter;
mod backend;
mod error;
mod session;

pub use adapter::{AdapterEvent, AdapterSignal, RecognizerAdapter};
pub use backend::{
    classify_error, BackendEvent, ErrorClass, RecognitionBackend, RecognizerConfig,
    RecognizerFactory, ResultEntry,
};
pub use error::{RecognizerError, RecognizerResult};
pub use session::Session;
