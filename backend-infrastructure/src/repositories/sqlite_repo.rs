use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use backend_domain::DbConfig;

const BUSY_TIMEOUT_SECONDS: u64 = 5;

const CREATE_ATTENDANCE: &str = r#"
CREATE TABLE IF NOT EXISTS attendance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_id INTEGER NOT NULL,
    device_id INTEGER NOT NULL,
    device_user_id TEXT NOT NULL,
    student_id INTEGER NULL,
    event_type TEXT NOT NULL CHECK (event_type IN ('IN', 'OUT', 'UNKNOWN')),
    occurred_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    raw_payload TEXT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    UNIQUE (device_id, device_user_id, occurred_at)
)
"#;

const CREATE_ATTENDANCE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_attendance_school_time ON attendance_records (school_id, occurred_at)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_student_time ON attendance_records (student_id, occurred_at)",
];

// Owned by the registry service; created here only so a standalone node can boot.
const CREATE_REGISTRY: [&str; 5] = [
    r#"
CREATE TABLE IF NOT EXISTS schools (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS classes (
    id INTEGER PRIMARY KEY,
    school_id INTEGER NOT NULL,
    name TEXT NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY,
    school_id INTEGER NOT NULL,
    class_id INTEGER NULL,
    full_name TEXT NOT NULL,
    admission_number TEXT NULL,
    device_user_id INTEGER NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_deleted INTEGER NOT NULL DEFAULT 0
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_students_device_user ON students (school_id, device_user_id)",
    r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY,
    school_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    is_online INTEGER NOT NULL DEFAULT 0,
    is_deleted INTEGER NOT NULL DEFAULT 0
)
"#,
];

/// SQLite-backed store for attendance records and the registry views it joins against.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECONDS));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Private database that lives as long as the pool; used by tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn create_tables(&self) -> Result<()> {
        sqlx::query(CREATE_ATTENDANCE).execute(&self.pool).await?;
        for statement in CREATE_ATTENDANCE_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        for statement in CREATE_REGISTRY {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}
