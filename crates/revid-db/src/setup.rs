//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path;
//! the schema is created idempotently (all statements use IF NOT EXISTS).

use anyhow::Result;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::path::Path;

/// Open (creating if missing) the `SQLite` database and ensure the schema
/// exists. Foreign keys are enabled so task/frame rows cascade when their
/// file or task is deleted.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true),
    )
    .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full production schema, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect_with(
        "sqlite::memory:"
            .parse::<SqliteConnectOptions>()?
            .foreign_keys(true),
    )
    .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// Safe to call multiple times.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            directory TEXT NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            duration REAL NOT NULL DEFAULT 0,
            frame_rate REAL NOT NULL DEFAULT 0,
            frames INTEGER NOT NULL DEFAULT 0,
            probe_info TEXT,
            UNIQUE(name, directory)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            codec TEXT NOT NULL CHECK (codec IN ('h264', 'h265')),
            encode_type TEXT NOT NULL CHECK (encode_type IN ('crf', 'abr')),
            encode_value INTEGER NOT NULL,
            preset TEXT NOT NULL,
            tune TEXT,
            extra_args TEXT,
            keep_original_main_audio INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS encode_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_file_id INTEGER NOT NULL,
            compressed_file_id INTEGER,
            profile_id INTEGER NOT NULL,
            encode_type TEXT NOT NULL CHECK (encode_type IN ('crf', 'abr')),
            encode_value INTEGER NOT NULL,
            worker TEXT,
            status INTEGER NOT NULL DEFAULT 0,
            progress REAL NOT NULL DEFAULT 0,
            encode_framerate REAL NOT NULL DEFAULT 0,
            seconds_remaining INTEGER NOT NULL DEFAULT -1,
            created_at TEXT NOT NULL,
            encode_start_at TEXT,
            encode_end_at TEXT,
            FOREIGN KEY (source_file_id) REFERENCES files(id) ON DELETE CASCADE,
            FOREIGN KEY (compressed_file_id) REFERENCES files(id) ON DELETE CASCADE,
            FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_encode_tasks_status ON encode_tasks(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_file_id INTEGER NOT NULL,
            compressed_file_id INTEGER NOT NULL,
            psnr INTEGER NOT NULL DEFAULT 1,
            ms_ssim INTEGER NOT NULL DEFAULT 1,
            vmaf INTEGER NOT NULL DEFAULT 1,
            neg_mode INTEGER NOT NULL DEFAULT 0,
            subsample_rate INTEGER NOT NULL DEFAULT 1 CHECK (subsample_rate >= 1),
            worker TEXT,
            status INTEGER NOT NULL DEFAULT 0,
            progress REAL NOT NULL DEFAULT 0,
            processing_framerate REAL NOT NULL DEFAULT 0,
            seconds_remaining INTEGER NOT NULL DEFAULT -1,
            created_at TEXT NOT NULL,
            analyze_start_at TEXT,
            analyze_end_at TEXT,
            FOREIGN KEY (source_file_id) REFERENCES files(id) ON DELETE CASCADE,
            FOREIGN KEY (compressed_file_id) REFERENCES files(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_metric_tasks_status ON metric_tasks(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS frames (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            frame_number INTEGER NOT NULL,
            psnr REAL,
            ms_ssim REAL,
            vmaf REAL,
            FOREIGN KEY (task_id) REFERENCES metric_tasks(id) ON DELETE CASCADE,
            UNIQUE(task_id, frame_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_frames_task ON frames(task_id)")
        .execute(pool)
        .await?;

    // One pooled table per metric; task_id doubles as the primary key so
    // each task carries at most one row per metric.
    for table in ["pooled_psnr", "pooled_ms_ssim", "pooled_vmaf"] {
        let statement = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                task_id INTEGER PRIMARY KEY,
                min REAL NOT NULL,
                max REAL NOT NULL,
                mean REAL NOT NULL,
                harmonic_mean REAL NOT NULL,
                one_percent_low REAL NOT NULL,
                point_one_percent_low REAL NOT NULL,
                FOREIGN KEY (task_id) REFERENCES metric_tasks(id) ON DELETE CASCADE
            )
            "#
        );
        sqlx::query(&statement).execute(pool).await?;
    }

    Ok(())
}
