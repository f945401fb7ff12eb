//! Device enumeration and permission probes
//!
//! Collaborator seam: the engine itself only cares about `device_id` and
//! `permission` in the store. The probes here feed those fields. Probe
//! failures are swallowed into reported diagnostics and never thrown into
//! the engine's reconciliation path.

use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{DeviceInfo, Permission, VoiceAction, VoiceStore};

/// Probe errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// Device enumeration failed
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Permission query failed
    #[error("Permission query failed: {0}")]
    QueryFailed(String),

    /// The host exposes no media device support
    #[error("Media devices are not supported on this host")]
    Unsupported,
}

/// Result type for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Host capability for enumerating audio inputs and querying permission
pub trait DeviceProbe: Send + Sync {
    /// List available audio-input descriptors
    fn enumerate(&self) -> ProbeResult<Vec<DeviceInfo>>;

    /// Query the current microphone permission
    fn query_permission(&self) -> ProbeResult<Permission>;
}

/// Refresh the store's device list from a probe
///
/// Keeps the current selection when the device is still present, otherwise
/// falls back to the default device (or the first one). A failed probe is
/// recorded as a diagnostic; the store's device fields are left untouched.
pub fn sync_devices(store: &VoiceStore, probe: &dyn DeviceProbe) {
    match probe.enumerate() {
        Ok(devices) => {
            let state = store.get_state();
            let selected = state
                .device_id
                .clone()
                .filter(|id| devices.iter().any(|d| &d.id == id))
                .or_else(|| devices.iter().find(|d| d.is_default).map(|d| d.id.clone()))
                .or_else(|| devices.first().map(|d| d.id.clone()));

            debug!(count = devices.len(), selected = ?selected, "Device list refreshed");
            store.dispatch(VoiceAction::SetDeviceList(devices));
            store.dispatch(VoiceAction::SetDeviceId(selected));
        }
        Err(err) => {
            warn!(error = %err, "Device enumeration failed");
            store.dispatch(VoiceAction::SetLastError(Some(err.to_string())));
        }
    }
}

/// Refresh the store's permission field from a probe
///
/// An unsupported host maps to `Permission::Unsupported`; other failures
/// are recorded as diagnostics without altering permission.
pub fn sync_permission(store: &VoiceStore, probe: &dyn DeviceProbe) {
    match probe.query_permission() {
        Ok(permission) => {
            debug!(permission = ?permission, "Permission refreshed");
            store.dispatch(VoiceAction::SetPermission(permission));
        }
        Err(ProbeError::Unsupported) => {
            warn!("Media devices unsupported; marking permission unsupported");
            store.dispatch(VoiceAction::SetPermission(Permission::Unsupported));
        }
        Err(err) => {
            warn!(error = %err, "Permission query failed");
            store.dispatch(VoiceAction::SetLastError(Some(err.to_string())));
        }
    }
}
