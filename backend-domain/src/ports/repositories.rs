use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    AttendanceEvent,
    AttendanceFilter,
    CommittedBatch,
    DayCounts,
    DedupKey,
    Device,
    NewAttendanceRecord,
    PagedResult,
    StudentPunch,
    StudentSummary,
};
use crate::value_objects::{DeviceId, RecordId, SchoolId, StudentId};

/// Sole write path for attendance records, plus the read queries that share its schema.
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Keys already stored for `device_id` with `occurred_at` in `[from, to]`,
    /// soft-deleted rows included.
    async fn existing_keys(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<HashSet<DedupKey>>;

    /// Non-deleted punches of the given students in `[from, to)`, ascending by time.
    async fn student_history(
        &self,
        student_ids: &[StudentId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<StudentPunch>>;

    /// Inserts every staged record and enriches the new rows in one transaction.
    /// Nothing is committed if any step fails.
    async fn commit_batch(&self, staged: &[NewAttendanceRecord]) -> anyhow::Result<CommittedBatch>;

    async fn list_events(&self, filter: &AttendanceFilter) -> anyhow::Result<PagedResult<AttendanceEvent>>;

    async fn day_counts(
        &self,
        school_id: SchoolId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<DayCounts>;

    async fn student_events(
        &self,
        student_id: StudentId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttendanceEvent>>;

    async fn soft_delete(&self, id: RecordId) -> anyhow::Result<bool>;

    async fn ping(&self) -> anyhow::Result<()>;
}

/// Identity mapping owned by the registry service.
#[async_trait]
pub trait StudentDirectory: Send + Sync {
    /// Active, non-deleted students of `school_id` keyed by terminal user id.
    async fn find_by_device_user_ids(
        &self,
        school_id: SchoolId,
        device_user_ids: &[i64],
    ) -> anyhow::Result<HashMap<i64, StudentId>>;

    async fn count_active_students(&self, school_id: SchoolId) -> anyhow::Result<u64>;

    async fn find_student(&self, student_id: StudentId) -> anyhow::Result<Option<StudentSummary>>;
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn get_device(&self, device_id: DeviceId) -> anyhow::Result<Option<Device>>;
    async fn online_devices(&self) -> anyhow::Result<Vec<Device>>;
}
