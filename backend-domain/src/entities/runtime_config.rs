// Runtime configuration shared across layers

use chrono::FixedOffset;

use crate::utils::default_timezone;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub device_gateway_url: Option<String>,
    pub device_gateway_token: Option<String>,
    pub duplicate_window_minutes: u64,
    pub timezone: FixedOffset,
    pub poll_enabled: bool,
    pub poll_interval_seconds: u64,
    pub device_fetch_timeout_seconds: u64,
    pub max_concurrent_polls: usize,
    pub shutdown_grace_seconds: u64,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            api_token: None,
            device_gateway_url: None,
            device_gateway_token: None,
            duplicate_window_minutes: 30,
            timezone: default_timezone(),
            poll_enabled: true,
            poll_interval_seconds: 120,
            device_fetch_timeout_seconds: 5,
            max_concurrent_polls: 4,
            shutdown_grace_seconds: 10,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
}
