use std::sync::Arc;

use backend_domain::ports::{
    AttendanceRepository, DeviceLogSource, DeviceRegistry, HealthCheckService, StudentDirectory,
};
use backend_domain::RuntimeConfig;

use crate::ops::{AttendanceStreamHub, DeviceLocks};
use crate::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub attendance_repo: Arc<dyn AttendanceRepository>,
    pub student_directory: Arc<dyn StudentDirectory>,
    pub device_registry: Arc<dyn DeviceRegistry>,
    pub log_source: Arc<dyn DeviceLogSource>,
    pub health_service: Arc<dyn HealthCheckService>,
    pub stream_hub: Arc<AttendanceStreamHub>,
    pub device_locks: Arc<DeviceLocks>,
    pub metrics: Arc<Metrics>,
}
