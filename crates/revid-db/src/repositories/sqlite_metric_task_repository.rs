//! `SQLite` implementation of the `MetricTaskRepository` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use revid_core::domain::{
    FrameScore, MetricKind, MetricTask, MetricTaskDetail, NewFrameScore, NewMetricTask,
    PooledMetric, ProgressUpdate, TaskStatus,
};
use revid_core::{MetricTaskRepository, RepositoryError};

use super::row_mappers::{
    row_to_file, row_to_frame, row_to_metric_task, row_to_pooled, FILE_COLUMNS,
    METRIC_TASK_COLUMNS,
};

fn storage(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn task_not_found(id: i64) -> RepositoryError {
    RepositoryError::NotFound(format!("Metric task with ID {id}"))
}

fn pooled_table(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Psnr => "pooled_psnr",
        MetricKind::MsSsim => "pooled_ms_ssim",
        MetricKind::Vmaf => "pooled_vmaf",
    }
}

/// `SQLite` implementation of the `MetricTaskRepository` trait.
pub struct SqliteMetricTaskRepository {
    pool: SqlitePool,
}

impl SqliteMetricTaskRepository {
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
impl MetricTaskRepository for SqliteMetricTaskRepository {
    async fn insert(&self, task: &NewMetricTask) -> Result<MetricTask, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO metric_tasks
                (source_file_id, compressed_file_id, psnr, ms_ssim, vmaf, neg_mode,
                 subsample_rate, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.source_file_id)
        .bind(task.compressed_file_id)
        .bind(i64::from(task.psnr))
        .bind(i64::from(task.ms_ssim))
        .bind(i64::from(task.vmaf))
        .bind(i64::from(task.neg_mode))
        .bind(task.subsample_rate)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        self.get(result.last_insert_rowid()).await
    }

    async fn get(&self, id: i64) -> Result<MetricTask, RepositoryError> {
        let query = format!("SELECT {METRIC_TASK_COLUMNS} FROM metric_tasks WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or_else(|| task_not_found(id))?;

        row_to_metric_task(&row)
    }

    async fn get_detail(&self, id: i64) -> Result<MetricTaskDetail, RepositoryError> {
        let task = self.get(id).await?;
        let source_file = self.load_file(task.source_file_id).await?;
        let compressed_file = self.load_file(task.compressed_file_id).await?;

        Ok(MetricTaskDetail {
            task,
            source_file,
            compressed_file,
        })
    }

    async fn list(&self) -> Result<Vec<MetricTask>, RepositoryError> {
        let query = format!("SELECT {METRIC_TASK_COLUMNS} FROM metric_tasks ORDER BY id DESC");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_metric_task).collect()
    }

    async fn list_incomplete(&self) -> Result<Vec<MetricTask>, RepositoryError> {
        let query = format!(
            "SELECT {METRIC_TASK_COLUMNS} FROM metric_tasks WHERE status != ? ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(i64::from(TaskStatus::Complete))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(row_to_metric_task).collect()
    }

    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE metric_tasks SET status = ? WHERE id = ?")
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
            r#"UPDATE metric_tasks SET
                progress = ?,
                processing_framerate = ?,
                seconds_remaining = ?,
                worker = COALESCE(?, worker),
                status = CASE WHEN status < ? THEN ? ELSE status END
               WHERE id = ?"#,
        )
        .bind(update.progress)
        .bind(update.fps.unwrap_or(0.0))
        .bind(update.eta.unwrap_or(-1))
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
            r#"UPDATE metric_tasks SET
                worker = ?,
                status = ?,
                progress = 0,
                processing_framerate = 0,
                seconds_remaining = -1
               WHERE id = ?"#,
        )
        .bind(worker)
        .bind(i64::from(TaskStatus::Downloading))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }

    async fn begin_analysis(&self, id: i64, worker: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE metric_tasks SET worker = ?, status = ?, analyze_start_at = ? WHERE id = ?",
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
            "UPDATE metric_tasks SET worker = ?, status = ?, analyze_end_at = ? WHERE id = ?",
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

    async fn replace_frames(
        &self,
        task_id: i64,
        frames: &[NewFrameScore],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("DELETE FROM frames WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        for frame in frames {
            sqlx::query(
                "INSERT INTO frames (task_id, frame_number, psnr, ms_ssim, vmaf) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(task_id)
            .bind(frame.frame_number)
            .bind(frame.psnr)
            .bind(frame.ms_ssim)
            .bind(frame.vmaf)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(frames.len())
    }

    async fn list_frames(&self, task_id: i64) -> Result<Vec<FrameScore>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, task_id, frame_number, psnr, ms_ssim, vmaf FROM frames \
             WHERE task_id = ? ORDER BY frame_number",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(row_to_frame).collect()
    }

    async fn upsert_pooled(
        &self,
        task_id: i64,
        kind: MetricKind,
        pooled: &PooledMetric,
    ) -> Result<(), RepositoryError> {
        let statement = format!(
            r#"INSERT INTO {} (task_id, min, max, mean, harmonic_mean, one_percent_low,
                point_one_percent_low)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(task_id) DO UPDATE SET
                min = excluded.min,
                max = excluded.max,
                mean = excluded.mean,
                harmonic_mean = excluded.harmonic_mean,
                one_percent_low = excluded.one_percent_low,
                point_one_percent_low = excluded.point_one_percent_low"#,
            pooled_table(kind)
        );

        sqlx::query(&statement)
            .bind(task_id)
            .bind(pooled.min)
            .bind(pooled.max)
            .bind(pooled.mean)
            .bind(pooled.harmonic_mean)
            .bind(pooled.one_percent_low)
            .bind(pooled.point_one_percent_low)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn get_pooled(
        &self,
        task_id: i64,
        kind: MetricKind,
    ) -> Result<Option<PooledMetric>, RepositoryError> {
        let query = format!(
            "SELECT min, max, mean, harmonic_mean, one_percent_low, point_one_percent_low \
             FROM {} WHERE task_id = ?",
            pooled_table(kind)
        );

        let row = sqlx::query(&query)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(row_to_pooled).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::SqliteFileRepository;
    use crate::setup::setup_test_database;
    use revid_core::domain::NewMediaFile;
    use revid_core::FileRepository;

    async fn seed_task(pool: &SqlitePool) -> MetricTask {
        let files = SqliteFileRepository::new(pool.clone());
        let tasks = SqliteMetricTaskRepository::new(pool.clone());

        let source = files
            .get_or_create(&NewMediaFile {
                name: "episode.mkv".into(),
                directory: "/in".into(),
                size: 8_000_000,
                duration: 120.0,
                frame_rate: 25.0,
                frames: 3000,
                probe_info: None,
            })
            .await
            .unwrap();
        let compressed = files
            .get_or_create(&NewMediaFile {
                name: "episode.mkv".into(),
                directory: "/out/x264".into(),
                size: 3_000_000,
                duration: 120.0,
                frame_rate: 25.0,
                frames: 3000,
                probe_info: None,
            })
            .await
            .unwrap();

        tasks
            .insert(&NewMetricTask {
                source_file_id: source.id,
                compressed_file_id: compressed.id,
                psnr: true,
                ms_ssim: true,
                vmaf: true,
                neg_mode: false,
                subsample_rate: 5,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_round_trips_flags() {
        let pool = setup_test_database().await.unwrap();
        let task = seed_task(&pool).await;

        assert!(task.psnr && task.ms_ssim && task.vmaf);
        assert!(!task.neg_mode);
        assert_eq!(task.subsample_rate, 5);
        assert_eq!(task.status, TaskStatus::Created);
    }

    #[tokio::test]
    async fn begin_analysis_stamps_start_without_resetting_progress() {
        let pool = setup_test_database().await.unwrap();
        let task = seed_task(&pool).await;
        let repo = SqliteMetricTaskRepository::new(pool);

        repo.begin_download(task.id, "worker-1").await.unwrap();
        repo.begin_analysis(task.id, "worker-1").await.unwrap();

        let reloaded = repo.get(task.id).await.unwrap();
        assert_eq!(reloaded.status, TaskStatus::Downloading);
        assert!(reloaded.analyze_start_at.is_some());
    }

    #[tokio::test]
    async fn replace_frames_is_idempotent() {
        let pool = setup_test_database().await.unwrap();
        let task = seed_task(&pool).await;
        let repo = SqliteMetricTaskRepository::new(pool);

        let frames: Vec<NewFrameScore> = (0..10)
            .map(|i| NewFrameScore {
                frame_number: i * 5,
                psnr: Some(44.0),
                ms_ssim: Some(0.99),
                vmaf: Some(95.0 + i as f64 / 10.0),
            })
            .collect();

        assert_eq!(repo.replace_frames(task.id, &frames).await.unwrap(), 10);
        // A re-POSTed report must not duplicate rows.
        assert_eq!(repo.replace_frames(task.id, &frames).await.unwrap(), 10);
        assert_eq!(repo.list_frames(task.id).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn pooled_upsert_overwrites_existing_row() {
        let pool = setup_test_database().await.unwrap();
        let task = seed_task(&pool).await;
        let repo = SqliteMetricTaskRepository::new(pool);

        let first = PooledMetric {
            min: 90.0,
            max: 99.0,
            mean: 96.0,
            harmonic_mean: 95.9,
            one_percent_low: 91.0,
            point_one_percent_low: 90.2,
        };
        repo.upsert_pooled(task.id, MetricKind::Vmaf, &first)
            .await
            .unwrap();

        let second = PooledMetric { mean: 96.5, ..first };
        repo.upsert_pooled(task.id, MetricKind::Vmaf, &second)
            .await
            .unwrap();

        let loaded = repo.get_pooled(task.id, MetricKind::Vmaf).await.unwrap();
        assert_eq!(loaded.unwrap().mean, 96.5);
        assert!(repo
            .get_pooled(task.id, MetricKind::Psnr)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deleting_task_cascades_to_frames_and_pooled_rows() {
        let pool = setup_test_database().await.unwrap();
        let task = seed_task(&pool).await;

        let repo = SqliteMetricTaskRepository::new(pool.clone());
        repo.replace_frames(
            task.id,
            &[NewFrameScore {
                frame_number: 0,
                psnr: None,
                ms_ssim: None,
                vmaf: Some(95.0),
            }],
        )
        .await
        .unwrap();

        sqlx::query("DELETE FROM metric_tasks WHERE id = ?")
            .bind(task.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(repo.list_frames(task.id).await.unwrap().is_empty());
    }
}
