//! `SQLite` implementation of the `EncodeTaskRepository` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use revid_core::domain::{
    EncodeTask, EncodeTaskDetail, NewEncodeTask, ProgressUpdate, TaskStatus,
};
use revid_core::{EncodeTaskRepository, RepositoryError};

use super::row_mappers::{row_to_encode_task, row_to_file, row_to_profile, ENCODE_TASK_COLUMNS,
    FILE_COLUMNS, PROFILE_COLUMNS};

fn storage(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn task_not_found(id: i64) -> RepositoryError {
    RepositoryError::NotFound(format!("Encode task with ID {id}"))
}

/// `SQLite` implementation of the `EncodeTaskRepository` trait.
pub struct SqliteEncodeTaskRepository {
    pool: SqlitePool,
}

impl SqliteEncodeTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_file(
        &self,
        id: i64,
    ) -> Result<revid_core::domain::MediaFile, RepositoryError> {
        let query = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| RepositoryError::NotFound(format!("File with ID {id}")))?;
        row_to_file(&row)
    }
}

#[async_trait]
impl EncodeTaskRepository for SqliteEncodeTaskRepository {
    async fn insert(&self, task: &NewEncodeTask) -> Result<EncodeTask, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO encode_tasks
                (source_file_id, compressed_file_id, profile_id, encode_type, encode_value,
                 created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.source_file_id)
        .bind(task.compressed_file_id)
        .bind(task.profile_id)
        .bind(task.encode_type.as_str())
        .bind(task.encode_value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        self.get(result.last_insert_rowid()).await
    }

    async fn get(&self, id: i64) -> Result<EncodeTask, RepositoryError> {
        let query = format!("SELECT {ENCODE_TASK_COLUMNS} FROM encode_tasks WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| task_not_found(id))?;

        row_to_encode_task(&row)
    }

    async fn get_detail(&self, id: i64) -> Result<EncodeTaskDetail, RepositoryError> {
        let task = self.get(id).await?;

        let source_file = self.load_file(task.source_file_id).await?;
        let compressed_file = match task.compressed_file_id {
            Some(file_id) => Some(self.load_file(file_id).await?),
            None => None,
        };

        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(task.profile_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Profile with ID {}", task.profile_id))
            })?;
        let profile = row_to_profile(&row)?;

        Ok(EncodeTaskDetail {
            task,
            source_file,
            compressed_file,
            profile,
        })
    }

    async fn list(&self) -> Result<Vec<EncodeTask>, RepositoryError> {
        let query = format!("SELECT {ENCODE_TASK_COLUMNS} FROM encode_tasks ORDER BY id DESC");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_encode_task).collect()
    }

    async fn list_incomplete(&self) -> Result<Vec<EncodeTask>, RepositoryError> {
        let query = format!(
            "SELECT {ENCODE_TASK_COLUMNS} FROM encode_tasks WHERE status != ? ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(i64::from(TaskStatus::Complete))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_encode_task).collect()
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE encode_tasks SET status = ? WHERE id = ?")
            .bind(i64::from(status))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        id: i64,
        worker: Option<&str>,
        update: &ProgressUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE encode_tasks SET
                progress = ?,
                encode_framerate = ?,
                seconds_remaining = ?,
                encode_type = COALESCE(?, encode_type),
                encode_value = COALESCE(?, encode_value),
                worker = COALESCE(?, worker),
                status = CASE WHEN status < ? THEN ? ELSE status END
               WHERE id = ?"#,
        )
        .bind(update.progress)
        .bind(update.fps.unwrap_or(0.0))
        .bind(update.eta.unwrap_or(-1))
        .bind(update.encode_type.map(|t| t.as_str()))
        .bind(update.encode_value)
        .bind(worker)
        .bind(i64::from(TaskStatus::InProgress))
        .bind(i64::from(TaskStatus::InProgress))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }

    async fn begin_download(&self, id: i64, worker: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE encode_tasks SET
                worker = ?,
                status = ?,
                progress = 0,
                encode_framerate = 0,
                seconds_remaining = -1,
                encode_start_at = ?
               WHERE id = ?"#,
        )
        .bind(worker)
        .bind(i64::from(TaskStatus::Downloading))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }

    async fn begin_upload(&self, id: i64) -> Result<(), RepositoryError> {
        self.set_status(id, TaskStatus::Uploading).await
    }

    async fn complete(&self, id: i64, worker: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE encode_tasks SET worker = ?, status = ?, encode_end_at = ? WHERE id = ?",
        )
        .bind(worker)
        .bind(i64::from(TaskStatus::Complete))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }
}
