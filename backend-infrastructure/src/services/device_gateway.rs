use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use backend_domain::ports::DeviceLogSource;
use backend_domain::{Device, DeviceUnavailable, RawPunch, RuntimeConfig};

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GatewayUserId {
    Text(String),
    Number(i64),
}

impl GatewayUserId {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value.trim().to_string(),
            Self::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayPunch {
    user_id: GatewayUserId,
    timestamp: String,
    #[serde(default)]
    punch: Option<i32>,
}

/// Reads terminal logs through the HTTP gateway that fronts the physical devices.
pub struct HttpDeviceLogSource {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
    timezone: FixedOffset,
}

impl HttpDeviceLogSource {
    pub fn new(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.device_fetch_timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: config.device_gateway_url.clone(),
            token: config.device_gateway_token.clone(),
            timezone: config.timezone,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[async_trait]
impl DeviceLogSource for HttpDeviceLogSource {
    async fn fetch_logs(&self, device: &Device) -> Result<Vec<RawPunch>, DeviceUnavailable> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(DeviceUnavailable::new(device.id, "no device gateway configured"));
        };
        let url = format!("{}/devices/{}/logs", base_url, device.id);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| DeviceUnavailable::new(device.id, err.to_string()))?;
        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|err| DeviceUnavailable::new(device.id, format!("malformed log payload: {}", err)))?;

        let received = entries.len();
        let punches = parse_entries(entries, self.timezone);
        if punches.len() < received {
            warn!(
                device_id = %device.id,
                dropped = received - punches.len(),
                "skipped unreadable log entries"
            );
        }
        debug!(device_id = %device.id, punches = punches.len(), "device logs fetched");
        Ok(punches)
    }
}

pub fn parse_entries(entries: Vec<Value>, timezone: FixedOffset) -> Vec<RawPunch> {
    entries
        .into_iter()
        .filter_map(|entry| parse_entry(entry, timezone))
        .collect()
}

fn parse_entry(entry: Value, timezone: FixedOffset) -> Option<RawPunch> {
    let punch: GatewayPunch = serde_json::from_value(entry.clone()).ok()?;
    let device_user_id = punch.user_id.into_string();
    if device_user_id.is_empty() {
        return None;
    }
    let occurred_at = parse_timestamp(&punch.timestamp, timezone)?;
    Some(RawPunch {
        device_user_id,
        occurred_at,
        punch_type: punch.punch,
        raw_payload: Some(entry),
    })
}

/// RFC 3339, or a naive wall-clock time read in the school timezone.
pub fn parse_timestamp(value: &str, timezone: FixedOffset) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(value, format).ok()?;
        timezone
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::{DeviceId, SchoolId};
    use serde_json::json;

    fn nairobi() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    #[test]
    fn naive_timestamps_use_school_offset() {
        let parsed = parse_timestamp("2024-03-04 07:45:00", nairobi()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 4, 4, 45, 0).unwrap());
    }

    #[test]
    fn rfc3339_keeps_its_own_offset() {
        let parsed = parse_timestamp("2024-03-04T07:45:00Z", nairobi()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 4, 7, 45, 0).unwrap());
    }

    #[test]
    fn entries_accept_numeric_user_ids_and_drop_garbage() {
        let punches = parse_entries(
            vec![
                json!({ "user_id": 1001, "timestamp": "2024-03-04 07:45:00", "punch": 0 }),
                json!({ "user_id": "0042", "timestamp": "2024-03-04T08:00:00+03:00" }),
                json!({ "user_id": "1003", "timestamp": "yesterday" }),
                json!({ "timestamp": "2024-03-04 08:00:00" }),
            ],
            nairobi(),
        );
        assert_eq!(punches.len(), 2);
        assert_eq!(punches[0].device_user_id, "1001");
        assert_eq!(punches[0].punch_type, Some(0));
        assert_eq!(punches[1].device_user_id, "0042");
        assert!(punches[1].raw_payload.is_some());
    }

    #[tokio::test]
    async fn unconfigured_gateway_reports_device_unavailable() {
        let source = HttpDeviceLogSource::new(&RuntimeConfig::default()).unwrap();
        assert!(!source.is_configured());
        let device = Device {
            id: DeviceId(7),
            school_id: SchoolId(1),
            name: "Main Gate".to_string(),
            is_online: true,
        };
        let err = source.fetch_logs(&device).await.unwrap_err();
        assert_eq!(err.device_id, DeviceId(7));
    }
}
