//! Voice state store
//!
//! Single source of truth for desired and observed listening state.
//! All durable state lives here so consumers observe it without coupling
//! to the engine's internals.
//!
//! # Module structure
//!
//! - `state` - the `VoiceState` shape, actions and the reducer
//! - `store` - the store itself with subscribe/dispatch machinery

mod state;
#[allow(clippy::module_inception)]
mod store;

pub use state::{
    changed_keys, reduce, DeviceInfo, Permission, StateKey, VoiceAction, VoiceState,
};
pub use store::VoiceStore;
