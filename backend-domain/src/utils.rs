// Time helpers shared by the pipeline and the query side.
// Day boundaries are always local midnight in the configured offset, never UTC midnight.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

const DEFAULT_UTC_OFFSET_SECONDS: i32 = 3 * 3600;

pub fn default_timezone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|err| anyhow!(err))
}

pub fn local_date(instant: DateTime<Utc>, timezone: FixedOffset) -> NaiveDate {
    instant.with_timezone(&timezone).date_naive()
}

pub fn today(timezone: FixedOffset) -> NaiveDate {
    local_date(Utc::now(), timezone)
}

/// `[start, end)` of a local calendar day, expressed in UTC.
pub fn local_day_bounds(date: NaiveDate, timezone: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = NaiveDateTime::new(date, NaiveTime::default());
    let utc_midnight = local_midnight - Duration::seconds(i64::from(timezone.local_minus_utc()));
    let start = Utc.from_utc_datetime(&utc_midnight);
    (start, start + Duration::days(1))
}

pub fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| anyhow!("stored timestamp {} is out of range", ms))
}

pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}
