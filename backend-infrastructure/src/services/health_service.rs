use std::sync::Arc;

use async_trait::async_trait;
use backend_domain::ports::{AttendanceRepository, HealthCheckService};

pub struct DefaultHealthService {
    attendance_repo: Arc<dyn AttendanceRepository>,
}

impl DefaultHealthService {
    pub fn new(attendance_repo: Arc<dyn AttendanceRepository>) -> Self {
        Self { attendance_repo }
    }
}

#[async_trait]
impl HealthCheckService for DefaultHealthService {
    async fn check_database(&self) -> anyhow::Result<bool> {
        self.attendance_repo.ping().await.map(|_| true)
    }
}
