use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use backend_domain::{
    ClassId,
    Device,
    DeviceId,
    DeviceRegistry,
    SchoolId,
    StudentDirectory,
    StudentId,
    StudentSummary,
};

use crate::repositories::SqliteRepo;

const IN_LIST_CHUNK: usize = 500;

#[derive(Debug, FromRow)]
struct DeviceRow {
    id: i64,
    school_id: i64,
    name: String,
    is_online: bool,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: DeviceId(row.id),
            school_id: SchoolId(row.school_id),
            name: row.name,
            is_online: row.is_online,
        }
    }
}

#[derive(Debug, FromRow)]
struct StudentRow {
    id: i64,
    school_id: i64,
    full_name: String,
    admission_number: Option<String>,
    class_id: Option<i64>,
    class_name: Option<String>,
}

#[async_trait]
impl StudentDirectory for SqliteRepo {
    async fn find_by_device_user_ids(
        &self,
        school_id: SchoolId,
        device_user_ids: &[i64],
    ) -> Result<HashMap<i64, StudentId>> {
        let mut matches = HashMap::with_capacity(device_user_ids.len());
        for chunk in device_user_ids.chunks(IN_LIST_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT device_user_id, id FROM students \
                 WHERE is_active = 1 AND is_deleted = 0 AND school_id = ",
            );
            builder.push_bind(school_id.0);
            builder.push(" AND device_user_id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY id ASC");

            let rows: Vec<(i64, i64)> = builder.build_query_as().fetch_all(self.pool()).await?;
            for (device_user_id, student_id) in rows {
                // Shared terminal ids resolve to the oldest student.
                matches.entry(device_user_id).or_insert(StudentId(student_id));
            }
        }
        Ok(matches)
    }

    async fn count_active_students(&self, school_id: SchoolId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM students WHERE school_id = ? AND is_active = 1 AND is_deleted = 0",
        )
        .bind(school_id.0)
        .fetch_one(self.pool())
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_student(&self, student_id: StudentId) -> Result<Option<StudentSummary>> {
        let row: Option<StudentRow> = sqlx::query_as(
            r#"
SELECT s.id, s.school_id, s.full_name, s.admission_number, s.class_id, c.name AS class_name
FROM students s
LEFT JOIN classes c ON c.id = s.class_id
WHERE s.id = ? AND s.is_deleted = 0
"#,
        )
        .bind(student_id.0)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| StudentSummary {
            id: StudentId(row.id),
            school_id: SchoolId(row.school_id),
            full_name: row.full_name,
            admission_number: row.admission_number,
            class_id: row.class_id.map(ClassId),
            class_name: row.class_name,
        }))
    }
}

#[async_trait]
impl DeviceRegistry for SqliteRepo {
    async fn get_device(&self, device_id: DeviceId) -> Result<Option<Device>> {
        let row: Option<DeviceRow> = sqlx::query_as(
            "SELECT id, school_id, name, is_online FROM devices WHERE id = ? AND is_deleted = 0",
        )
        .bind(device_id.0)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Device::from))
    }

    async fn online_devices(&self) -> Result<Vec<Device>> {
        let rows: Vec<DeviceRow> = sqlx::query_as(
            "SELECT id, school_id, name, is_online FROM devices \
             WHERE is_online = 1 AND is_deleted = 0 ORDER BY id ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Device::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_domain::AttendanceRepository;

    async fn seeded() -> SqliteRepo {
        let repo = SqliteRepo::in_memory().await.unwrap();
        repo.ensure_schema().await.unwrap();
        for statement in [
            "INSERT INTO classes (id, school_id, name) VALUES (5, 1, 'Form 2B')",
            "INSERT INTO students (id, school_id, class_id, full_name, device_user_id) VALUES (42, 1, 5, 'Amina Otieno', 1001)",
            "INSERT INTO students (id, school_id, full_name, device_user_id, is_active) VALUES (43, 1, 'Brian Mwangi', 1002, 0)",
            "INSERT INTO students (id, school_id, full_name, device_user_id, is_deleted) VALUES (44, 1, 'Carol Njeri', 1003, 1)",
            "INSERT INTO students (id, school_id, full_name, device_user_id) VALUES (45, 2, 'David Kamau', 1001)",
            "INSERT INTO devices (id, school_id, name, is_online) VALUES (7, 1, 'Main Gate', 1)",
            "INSERT INTO devices (id, school_id, name, is_online) VALUES (8, 1, 'Back Gate', 0)",
            "INSERT INTO devices (id, school_id, name, is_online, is_deleted) VALUES (9, 1, 'Old Gate', 1, 1)",
        ] {
            sqlx::query(statement).execute(repo.pool()).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_active_students_of_school() {
        let repo = seeded().await;
        let matches = repo
            .find_by_device_user_ids(SchoolId(1), &[1001, 1002, 1003, 9999])
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches.get(&1001), Some(&StudentId(42)));

        let other = repo.find_by_device_user_ids(SchoolId(2), &[1001]).await.unwrap();
        assert_eq!(other.get(&1001), Some(&StudentId(45)));
    }

    #[tokio::test]
    async fn counts_only_active_students() {
        let repo = seeded().await;
        assert_eq!(repo.count_active_students(SchoolId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_student_joins_class_name() {
        let repo = seeded().await;
        let student = repo.find_student(StudentId(42)).await.unwrap().unwrap();
        assert_eq!(student.class_name.as_deref(), Some("Form 2B"));
        assert!(repo.find_student(StudentId(44)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn online_devices_exclude_offline_and_deleted() {
        let repo = seeded().await;
        let devices = repo.online_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Main Gate");
        assert!(repo.get_device(DeviceId(8)).await.unwrap().is_some());
        assert!(repo.get_device(DeviceId(9)).await.unwrap().is_none());
    }
}
