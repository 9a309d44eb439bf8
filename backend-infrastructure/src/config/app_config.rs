use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use backend_domain::{default_timezone, DbConfig, RuntimeConfig};

use super::validation::parse_utc_offset;

// Classification never looks past local midnight, so a longer window changes nothing.
const MAX_DUPLICATE_WINDOW_MINUTES: u64 = 24 * 60;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub database_url: String,
    pub database_max_connections: u32,
    pub device_gateway_url: Option<String>,
    pub device_gateway_token: Option<String>,
    pub duplicate_window_minutes: u64,
    pub timezone: String,
    pub poll_enabled: bool,
    pub poll_interval_seconds: u64,
    pub device_fetch_timeout_seconds: u64,
    pub max_concurrent_polls: usize,
    pub shutdown_grace_seconds: u64,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            api_token: None,
            database_url: "sqlite://rollcall.sqlite3?mode=rwc".to_string(),
            database_max_connections: 5,
            device_gateway_url: None,
            device_gateway_token: None,
            duplicate_window_minutes: 30,
            timezone: "+03:00".to_string(),
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

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("ROLLCALL_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            warn!("{} not found, using defaults", path);
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        self.api_token = non_blank(self.api_token.take());
        self.device_gateway_url =
            non_blank(self.device_gateway_url.take()).map(|url| url.trim_end_matches('/').to_string());
        self.device_gateway_token = non_blank(self.device_gateway_token.take());
        self.timezone = self.timezone.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.database_url.trim().is_empty() {
            return Err(anyhow!("database_url must not be empty"));
        }
        if self.database_max_connections == 0 {
            return Err(anyhow!("database_max_connections must be greater than 0"));
        }
        if !(1..=MAX_DUPLICATE_WINDOW_MINUTES).contains(&self.duplicate_window_minutes) {
            return Err(anyhow!(
                "duplicate_window_minutes must be between 1 and {}",
                MAX_DUPLICATE_WINDOW_MINUTES
            ));
        }
        parse_utc_offset(&self.timezone).map_err(|err| anyhow!("invalid timezone: {}", err))?;
        if !(10..=3600).contains(&self.poll_interval_seconds) {
            return Err(anyhow!("poll_interval_seconds must be between 10 and 3600"));
        }
        if self.device_fetch_timeout_seconds == 0 {
            return Err(anyhow!("device_fetch_timeout_seconds must be greater than 0"));
        }
        if self.max_concurrent_polls == 0 {
            return Err(anyhow!("max_concurrent_polls must be greater than 0"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            api_token: self.api_token.clone(),
            device_gateway_url: self.device_gateway_url.clone(),
            device_gateway_token: self.device_gateway_token.clone(),
            duplicate_window_minutes: self.duplicate_window_minutes,
            timezone: parse_utc_offset(&self.timezone).unwrap_or_else(|_| default_timezone()),
            poll_enabled: self.poll_enabled,
            poll_interval_seconds: self.poll_interval_seconds,
            device_fetch_timeout_seconds: self.device_fetch_timeout_seconds,
            max_concurrent_polls: self.max_concurrent_polls,
            shutdown_grace_seconds: self.shutdown_grace_seconds,
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database_url.clone(),
            max_connections: self.database_max_connections,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("ROLLCALL_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("ROLLCALL_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Ok(value) = env::var("ROLLCALL_DATABASE_URL") {
            self.database_url = value;
        }
        if let Ok(value) = env::var("ROLLCALL_DATABASE_MAX_CONNECTIONS") {
            self.database_max_connections = value.parse().unwrap_or(self.database_max_connections);
        }
        if let Ok(value) = env::var("ROLLCALL_DEVICE_GATEWAY_URL") {
            self.device_gateway_url = Some(value);
        }
        if let Ok(value) = env::var("ROLLCALL_DEVICE_GATEWAY_TOKEN") {
            self.device_gateway_token = Some(value);
        }
        if let Ok(value) = env::var("ROLLCALL_DUPLICATE_WINDOW_MINUTES") {
            self.duplicate_window_minutes = value.parse().unwrap_or(self.duplicate_window_minutes);
        }
        if let Ok(value) = env::var("ROLLCALL_TIMEZONE") {
            self.timezone = value;
        }
        if let Ok(value) = env::var("ROLLCALL_POLL_ENABLED") {
            self.poll_enabled = value.parse().unwrap_or(self.poll_enabled);
        }
        if let Ok(value) = env::var("ROLLCALL_POLL_INTERVAL_SECONDS") {
            self.poll_interval_seconds = value.parse().unwrap_or(self.poll_interval_seconds);
        }
        if let Ok(value) = env::var("ROLLCALL_DEVICE_FETCH_TIMEOUT_SECONDS") {
            self.device_fetch_timeout_seconds =
                value.parse().unwrap_or(self.device_fetch_timeout_seconds);
        }
        if let Ok(value) = env::var("ROLLCALL_MAX_CONCURRENT_POLLS") {
            self.max_concurrent_polls = value.parse().unwrap_or(self.max_concurrent_polls);
        }
        if let Ok(value) = env::var("ROLLCALL_SHUTDOWN_GRACE_SECONDS") {
            self.shutdown_grace_seconds = value.parse().unwrap_or(self.shutdown_grace_seconds);
        }
        if let Ok(value) = env::var("ROLLCALL_MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Ok(value) = env::var("ROLLCALL_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");
        let runtime = config.to_runtime_config();
        assert_eq!(runtime.duplicate_window_minutes, 30);
        assert_eq!(runtime.timezone.local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
duplicate_window_minutes = 10
timezone = "+01:00"
device_gateway_url = "http://gateway.local/"
"#,
        )
        .expect("parse");
        let mut config = config;
        config.normalize();
        config.validate().expect("validate");
        assert_eq!(config.poll_interval_seconds, 120);
        assert_eq!(config.device_gateway_url.as_deref(), Some("http://gateway.local"));
        assert_eq!(config.to_runtime_config().timezone.local_minus_utc(), 3600);
    }

    #[test]
    fn full_day_window_is_accepted() {
        let config = AppConfig {
            duplicate_window_minutes: 24 * 60,
            ..AppConfig::default()
        };
        config.validate().expect("one day window validates");
    }

    #[test]
    fn blank_optionals_normalize_to_none() {
        let mut config = AppConfig {
            api_token: Some("  ".to_string()),
            device_gateway_token: Some(String::new()),
            ..AppConfig::default()
        };
        config.normalize();
        assert!(config.api_token.is_none());
        assert!(config.device_gateway_token.is_none());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            AppConfig {
                duplicate_window_minutes: 0,
                ..AppConfig::default()
            },
            AppConfig {
                duplicate_window_minutes: 24 * 60 + 1,
                ..AppConfig::default()
            },
            AppConfig {
                duplicate_window_minutes: 200_000_000_000_000,
                ..AppConfig::default()
            },
            AppConfig {
                timezone: "Mars/Olympus".to_string(),
                ..AppConfig::default()
            },
            AppConfig {
                poll_interval_seconds: 1,
                ..AppConfig::default()
            },
            AppConfig {
                max_concurrent_polls: 0,
                ..AppConfig::default()
            },
            AppConfig {
                bind_addr: "nowhere".to_string(),
                ..AppConfig::default()
            },
        ];
        for config in cases {
            assert!(config.validate().is_err());
        }
    }
}
