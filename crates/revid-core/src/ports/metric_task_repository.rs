//! Metric-task repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{
    FrameScore, MetricKind, MetricTask, MetricTaskDetail, NewFrameScore, NewMetricTask,
    PooledMetric, ProgressUpdate, TaskStatus,
};

/// Repository for metric tasks, their per-frame scores, and pooled rows.
#[async_trait]
pub trait MetricTaskRepository: Send + Sync {
    /// Insert a new task and return it with its assigned ID.
    async fn insert(&self, task: &NewMetricTask) -> Result<MetricTask, RepositoryError>;

    /// Get a task by its database ID.
    async fn get(&self, id: i64) -> Result<MetricTask, RepositoryError>;

    /// Get a task with both referenced files loaded.
    async fn get_detail(&self, id: i64) -> Result<MetricTaskDetail, RepositoryError>;

    /// List all tasks, newest first.
    async fn list(&self) -> Result<Vec<MetricTask>, RepositoryError>;

    /// List tasks whose status is not `Complete`.
    async fn list_incomplete(&self) -> Result<Vec<MetricTask>, RepositoryError>;

    /// Set a task's status without touching anything else.
    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<(), RepositoryError>;

    /// Apply a worker progress update (same semantics as encode tasks;
    /// encode parameters in the update are ignored).
    async fn update_progress(
        &self,
        id: i64,
        worker: Option<&str>,
        update: &ProgressUpdate,
    ) -> Result<(), RepositoryError>;

    /// Record that a worker started downloading the reference file: adopt
    /// the worker, reset progress fields, set status to `Downloading`.
    async fn begin_download(&self, id: i64, worker: &str) -> Result<(), RepositoryError>;

    /// Record that a worker started downloading the compressed file: adopt
    /// the worker, stamp `analyze_start_at`, set status to `Downloading`.
    async fn begin_analysis(&self, id: i64, worker: &str) -> Result<(), RepositoryError>;

    /// Set the status to `Uploading` while the report streams in.
    async fn begin_upload(&self, id: i64) -> Result<(), RepositoryError>;

    /// Finish the task: adopt the worker, stamp `analyze_end_at`, and set
    /// the status to `Complete`. Safe to call repeatedly.
    async fn complete(&self, id: i64, worker: &str) -> Result<(), RepositoryError>;

    /// Replace all frame rows for a task with the given scores.
    ///
    /// Delete-then-insert keeps report re-uploads idempotent. Returns the
    /// number of rows written.
    async fn replace_frames(
        &self,
        task_id: i64,
        frames: &[NewFrameScore],
    ) -> Result<usize, RepositoryError>;

    /// List a task's frame rows ordered by frame number.
    async fn list_frames(&self, task_id: i64) -> Result<Vec<FrameScore>, RepositoryError>;

    /// Write (or overwrite) the pooled row for one metric of a task.
    async fn upsert_pooled(
        &self,
        task_id: i64,
        kind: MetricKind,
        pooled: &PooledMetric,
    ) -> Result<(), RepositoryError>;

    /// Read the pooled row for one metric of a task, if present.
    async fn get_pooled(
        &self,
        task_id: i64,
        kind: MetricKind,
    ) -> Result<Option<PooledMetric>, RepositoryError>;
}
