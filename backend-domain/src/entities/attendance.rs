// Attendance entities
// A punch travels RawPunch -> NewAttendanceRecord (staged) -> AttendanceEvent (committed)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value_objects::{ClassId, DeviceId, EventType, RecordId, SchoolId, StudentId};

/// One scan as reported by a terminal, before any resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPunch {
    pub device_user_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punch_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
}

/// Storage uniqueness key. Millisecond precision matches the stored column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub device_id: DeviceId,
    pub device_user_id: String,
    pub occurred_at_ms: i64,
}

impl DedupKey {
    pub fn new(device_id: DeviceId, device_user_id: &str, occurred_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            device_user_id: device_user_id.to_string(),
            occurred_at_ms: occurred_at.timestamp_millis(),
        }
    }
}

/// A classified punch waiting for the batch commit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub school_id: SchoolId,
    pub device_id: DeviceId,
    pub device_user_id: String,
    pub student_id: Option<StudentId>,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub raw_payload: Option<Value>,
}

impl NewAttendanceRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.device_id, &self.device_user_id, self.occurred_at)
    }

    pub fn is_unmatched(&self) -> bool {
        self.student_id.is_none()
    }
}

/// The minimal view of an accepted punch needed to classify the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorPunch {
    pub occurred_at: DateTime<Utc>,
    pub event_type: EventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentPunch {
    pub student_id: StudentId,
    pub punch: PriorPunch,
}

/// A persisted record joined with its display fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: RecordId,
    pub school_id: SchoolId,
    pub device_id: DeviceId,
    pub device_name: Option<String>,
    pub device_user_id: String,
    pub student_id: Option<StudentId>,
    pub student_name: Option<String>,
    pub admission_number: Option<String>,
    pub class_id: Option<ClassId>,
    pub class_name: Option<String>,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one stage-then-commit transaction.
#[derive(Debug, Clone, Default)]
pub struct CommittedBatch {
    pub inserted: Vec<AttendanceEvent>,
    /// Rows rejected by the uniqueness constraint after the pre-check passed.
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped_duplicate: usize,
    pub unmatched: usize,
    pub total: usize,
}
