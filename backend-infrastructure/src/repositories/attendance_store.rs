use std::collections::HashSet;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use backend_domain::{
    current_millis,
    millis_to_utc,
    AttendanceEvent,
    AttendanceFilter,
    AttendanceRepository,
    ClassId,
    CommittedBatch,
    DayCounts,
    DedupKey,
    DeviceId,
    EventType,
    NewAttendanceRecord,
    PagedResult,
    PriorPunch,
    RecordId,
    SchoolId,
    StudentId,
    StudentPunch,
};

use crate::repositories::SqliteRepo;

// Well under SQLite's bound-parameter limit.
const IN_LIST_CHUNK: usize = 500;

const EVENT_SELECT: &str = r#"
SELECT r.id, r.school_id, r.device_id, d.name AS device_name, r.device_user_id, r.student_id,
       s.full_name AS student_name, s.admission_number, s.class_id, c.name AS class_name,
       r.event_type, r.occurred_at, r.created_at
FROM attendance_records r
LEFT JOIN devices d ON d.id = r.device_id
LEFT JOIN students s ON s.id = r.student_id
LEFT JOIN classes c ON c.id = s.class_id
"#;

const INSERT_RECORD: &str = r#"
INSERT INTO attendance_records
    (school_id, device_id, device_user_id, student_id, event_type, occurred_at, created_at, raw_payload)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (device_id, device_user_id, occurred_at) DO NOTHING
RETURNING id
"#;

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    school_id: i64,
    device_id: i64,
    device_name: Option<String>,
    device_user_id: String,
    student_id: Option<i64>,
    student_name: Option<String>,
    admission_number: Option<String>,
    class_id: Option<i64>,
    class_name: Option<String>,
    event_type: String,
    occurred_at: i64,
    created_at: i64,
}

impl EventRow {
    fn into_event(self) -> Result<AttendanceEvent> {
        let event_type = self
            .event_type
            .parse::<EventType>()
            .map_err(|err| anyhow!("record {}: {err}", self.id))?;
        Ok(AttendanceEvent {
            id: RecordId(self.id),
            school_id: SchoolId(self.school_id),
            device_id: DeviceId(self.device_id),
            device_name: self.device_name,
            device_user_id: self.device_user_id,
            student_id: self.student_id.map(StudentId),
            student_name: self.student_name,
            admission_number: self.admission_number,
            class_id: self.class_id.map(ClassId),
            class_name: self.class_name,
            event_type,
            occurred_at: millis_to_utc(self.occurred_at)?,
            created_at: millis_to_utc(self.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    student_id: i64,
    event_type: String,
    occurred_at: i64,
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<AttendanceEvent>> {
    rows.into_iter().map(EventRow::into_event).collect()
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &AttendanceFilter) {
    builder.push(" WHERE r.is_deleted = 0 AND r.school_id = ");
    builder.push_bind(filter.school_id.0);
    builder.push(" AND r.occurred_at >= ");
    builder.push_bind(filter.from.timestamp_millis());
    builder.push(" AND r.occurred_at < ");
    builder.push_bind(filter.to.timestamp_millis());
    if let Some(student_id) = filter.student_id {
        builder.push(" AND r.student_id = ");
        builder.push_bind(student_id.0);
    }
    if let Some(class_id) = filter.class_id {
        builder.push(" AND s.class_id = ");
        builder.push_bind(class_id.0);
    }
    if let Some(device_id) = filter.device_id {
        builder.push(" AND r.device_id = ");
        builder.push_bind(device_id.0);
    }
    if let Some(event_type) = filter.event_type {
        builder.push(" AND r.event_type = ");
        builder.push_bind(event_type.as_str());
    }
}

async fn fetch_events_by_id(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<AttendanceEvent>> {
    let mut events = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(IN_LIST_CHUNK) {
        let mut builder = QueryBuilder::<Sqlite>::new(EVENT_SELECT);
        builder.push(" WHERE r.id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let rows = builder
            .build_query_as::<EventRow>()
            .fetch_all(&mut *conn)
            .await?;
        events.extend(into_events(rows)?);
    }
    events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
    Ok(events)
}

#[async_trait]
impl AttendanceRepository for SqliteRepo {
    async fn ensure_schema(&self) -> Result<()> {
        self.create_tables().await
    }

    async fn existing_keys(
        &self,
        device_id: DeviceId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashSet<DedupKey>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT device_user_id, occurred_at FROM attendance_records \
             WHERE device_id = ? AND occurred_at >= ? AND occurred_at <= ?",
        )
        .bind(device_id.0)
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(device_user_id, occurred_at_ms)| DedupKey {
                device_id,
                device_user_id,
                occurred_at_ms,
            })
            .collect())
    }

    async fn student_history(
        &self,
        student_ids: &[StudentId],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StudentPunch>> {
        let mut punches = Vec::new();
        for chunk in student_ids.chunks(IN_LIST_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT student_id, event_type, occurred_at FROM attendance_records \
                 WHERE is_deleted = 0 AND student_id IS NOT NULL AND occurred_at >= ",
            );
            builder.push_bind(from.timestamp_millis());
            builder.push(" AND occurred_at < ");
            builder.push_bind(to.timestamp_millis());
            builder.push(" AND student_id IN (");
            let mut separated = builder.separated(", ");
            for student_id in chunk {
                separated.push_bind(student_id.0);
            }
            separated.push_unseparated(")");

            let rows = builder
                .build_query_as::<HistoryRow>()
                .fetch_all(self.pool())
                .await?;
            for row in rows {
                let event_type = row
                    .event_type
                    .parse::<EventType>()
                    .map_err(|err| anyhow!(err))?;
                punches.push(StudentPunch {
                    student_id: StudentId(row.student_id),
                    punch: PriorPunch {
                        occurred_at: millis_to_utc(row.occurred_at)?,
                        event_type,
                    },
                });
            }
        }
        punches.sort_by_key(|entry| entry.punch.occurred_at);
        Ok(punches)
    }

    async fn commit_batch(&self, staged: &[NewAttendanceRecord]) -> Result<CommittedBatch> {
        if staged.is_empty() {
            return Ok(CommittedBatch::default());
        }

        let mut tx = self.pool().begin().await?;
        let created_at = current_millis();
        let mut ids = Vec::with_capacity(staged.len());
        let mut conflicts = 0;

        for record in staged {
            if !record.event_type.is_persistable() {
                return Err(anyhow!(
                    "refusing to store {} punch for device user {}",
                    record.event_type,
                    record.device_user_id
                ));
            }
            let raw_payload = record
                .raw_payload
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let id: Option<i64> = sqlx::query_scalar(INSERT_RECORD)
                .bind(record.school_id.0)
                .bind(record.device_id.0)
                .bind(&record.device_user_id)
                .bind(record.student_id.map(|id| id.0))
                .bind(record.event_type.as_str())
                .bind(record.occurred_at.timestamp_millis())
                .bind(created_at)
                .bind(raw_payload)
                .fetch_optional(&mut *tx)
                .await?;
            match id {
                Some(id) => ids.push(id),
                None => conflicts += 1,
            }
        }

        let inserted = fetch_events_by_id(&mut tx, &ids).await?;
        if inserted.len() != ids.len() {
            return Err(anyhow!(
                "enrichment returned {} of {} inserted rows",
                inserted.len(),
                ids.len()
            ));
        }

        tx.commit().await?;
        Ok(CommittedBatch { inserted, conflicts })
    }

    async fn list_events(&self, filter: &AttendanceFilter) -> Result<PagedResult<AttendanceEvent>> {
        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM attendance_records r LEFT JOIN students s ON s.id = r.student_id",
        );
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool()).await?;

        let mut page = QueryBuilder::<Sqlite>::new(EVENT_SELECT);
        push_filter(&mut page, filter);
        page.push(" ORDER BY r.occurred_at DESC, r.id DESC LIMIT ");
        page.push_bind(i64::from(filter.page_size));
        page.push(" OFFSET ");
        page.push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));
        let rows = page.build_query_as::<EventRow>().fetch_all(self.pool()).await?;

        Ok(PagedResult::new(
            into_events(rows)?,
            filter.page,
            filter.page_size,
            u64::try_from(total).unwrap_or_default(),
        ))
    }

    async fn day_counts(&self, school_id: SchoolId, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<DayCounts> {
        let (total_events, checked_in, checked_out, students_checked_in): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
SELECT COUNT(*),
       COALESCE(SUM(CASE WHEN r.event_type = 'IN' THEN 1 ELSE 0 END), 0),
       COALESCE(SUM(CASE WHEN r.event_type = 'OUT' THEN 1 ELSE 0 END), 0),
       COUNT(DISTINCT CASE
           WHEN r.event_type = 'IN' AND s.is_active = 1 AND s.is_deleted = 0 THEN r.student_id
       END)
FROM attendance_records r
LEFT JOIN students s ON s.id = r.student_id AND s.school_id = r.school_id
WHERE r.is_deleted = 0 AND r.school_id = ? AND r.occurred_at >= ? AND r.occurred_at < ?
"#,
        )
        .bind(school_id.0)
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_one(self.pool())
        .await?;

        let to_u64 = |value: i64| u64::try_from(value).unwrap_or_default();
        Ok(DayCounts {
            total_events: to_u64(total_events),
            checked_in: to_u64(checked_in),
            checked_out: to_u64(checked_out),
            students_checked_in: to_u64(students_checked_in),
        })
    }

    async fn student_events(
        &self,
        student_id: StudentId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AttendanceEvent>> {
        let mut builder = QueryBuilder::<Sqlite>::new(EVENT_SELECT);
        builder.push(" WHERE r.is_deleted = 0 AND r.student_id = ");
        builder.push_bind(student_id.0);
        builder.push(" AND r.occurred_at >= ");
        builder.push_bind(from.timestamp_millis());
        builder.push(" AND r.occurred_at < ");
        builder.push_bind(to.timestamp_millis());
        builder.push(" ORDER BY r.occurred_at ASC, r.id ASC");
        let rows = builder.build_query_as::<EventRow>().fetch_all(self.pool()).await?;
        into_events(rows)
    }

    async fn soft_delete(&self, id: RecordId) -> Result<bool> {
        let result = sqlx::query("UPDATE attendance_records SET is_deleted = 1 WHERE id = ? AND is_deleted = 0")
            .bind(id.0)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}
