use async_trait::async_trait;

use crate::entities::{Device, RawPunch};
use crate::error::DeviceUnavailable;

/// Black-box access to the punches buffered on a terminal.
#[async_trait]
pub trait DeviceLogSource: Send + Sync {
    async fn fetch_logs(&self, device: &Device) -> Result<Vec<RawPunch>, DeviceUnavailable>;
}

#[async_trait]
pub trait HealthCheckService: Send + Sync {
    async fn check_database(&self) -> anyhow::Result<bool>;
}
