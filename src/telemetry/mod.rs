//! Telemetry sink seam
//!
//! The engine reports lifecycle events through a single `emit` call. The
//! signature is infallible on purpose: sink failures must never propagate
//! into, block, or alter engine state, so any fallible transport inside an
//! implementation swallows its own errors.

use serde_json::Value;

/// Collaborator interface for telemetry emission
pub trait TelemetrySink: Send + Sync {
    /// Report one event with structured properties
    fn emit(&self, event: &str, props: Value);
}

/// Sink that discards everything
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn emit(&self, _event: &str, _props: Value) {}
}

/// Sink that forwards events to the tracing subscriber
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: &str, props: Value) {
        tracing::debug!(event = %event, props = %props, "telemetry");
    }
}
