// Query-side request and response shapes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::AttendanceEvent;
use crate::value_objects::{ClassId, DeviceId, EventType, SchoolId, StudentId};

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    pub school_id: Option<i64>,
    pub date: Option<String>,
    pub student_id: Option<i64>,
    pub class_id: Option<i64>,
    pub device_id: Option<i64>,
    pub event_type: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub school_id: Option<i64>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentTimelineQuery {
    pub date: Option<String>,
}

/// Validated listing filter handed to the repository.
#[derive(Debug, Clone)]
pub struct AttendanceFilter {
    pub school_id: SchoolId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub student_id: Option<StudentId>,
    pub class_id: Option<ClassId>,
    pub device_id: Option<DeviceId>,
    pub event_type: Option<EventType>,
    pub page: u32,
    pub page_size: u32,
}

impl AttendanceFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        let size = u64::from(page_size.max(1));
        Self {
            items,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(size),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub total_events: u64,
    pub checked_in: u64,
    pub checked_out: u64,
    pub students_checked_in: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub date: NaiveDate,
    pub total_events: u64,
    pub checked_in: u64,
    pub checked_out: u64,
    pub active_students: u64,
    pub present_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub event: AttendanceEvent,
    pub local_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentTimeline {
    pub student_id: StudentId,
    pub student_name: String,
    pub date: NaiveDate,
    pub entries: Vec<TimelineEntry>,
    pub total_duration_seconds: i64,
    pub currently_in: bool,
}
