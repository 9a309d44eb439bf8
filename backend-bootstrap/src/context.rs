use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use backend_application::ops::{AttendanceStreamHub, DeviceLocks};
use backend_application::{AppState, Metrics};
use backend_domain::AttendanceRepository;
use backend_infrastructure::{AppConfig, DefaultHealthService, HttpDeviceLogSource, SqliteRepo};

pub struct AppContext {
    pub state: AppState,
    /// False when no device gateway is configured; manual ingestion then always fails.
    pub gateway_configured: bool,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();

        let repo = Arc::new(SqliteRepo::connect(&db_config).await?);
        repo.ensure_schema().await?;
        info!(database_url = %db_config.database_url, "attendance store ready");

        let log_source = HttpDeviceLogSource::new(&runtime_config)?;
        let gateway_configured = log_source.is_configured();
        if !gateway_configured {
            warn!("device_gateway_url not set, device logs cannot be fetched");
        }

        let state = AppState {
            config: runtime_config,
            attendance_repo: repo.clone(),
            student_directory: repo.clone(),
            device_registry: repo.clone(),
            log_source: Arc::new(log_source),
            health_service: Arc::new(DefaultHealthService::new(repo)),
            stream_hub: Arc::new(AttendanceStreamHub::default()),
            device_locks: Arc::new(DeviceLocks::default()),
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self {
            state,
            gateway_configured,
        })
    }
}
