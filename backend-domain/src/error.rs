use thiserror::Error;

use crate::value_objects::DeviceId;

/// The terminal could not be read: offline, credentials rejected, timed out or
/// returned something unparseable. Never retried within the same call.
#[derive(Debug, Clone, Error)]
#[error("device {device_id} unavailable: {reason}")]
pub struct DeviceUnavailable {
    pub device_id: DeviceId,
    pub reason: String,
}

impl DeviceUnavailable {
    pub fn new(device_id: DeviceId, reason: impl Into<String>) -> Self {
        Self {
            device_id,
            reason: reason.into(),
        }
    }
}
