//! Encode-task repository trait definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{EncodeTask, EncodeTaskDetail, NewEncodeTask, ProgressUpdate, TaskStatus};

/// Repository for encode tasks.
///
/// State transitions live here as named operations rather than a generic
/// update so every mutation of a task row is explicit and auditable.
#[async_trait]
pub trait EncodeTaskRepository: Send + Sync {
    /// Insert a new task and return it with its assigned ID.
    async fn insert(&self, task: &NewEncodeTask) -> Result<EncodeTask, RepositoryError>;

    /// Get a task by its database ID.
    async fn get(&self, id: i64) -> Result<EncodeTask, RepositoryError>;

    /// Get a task with its source/compressed files and profile loaded.
    async fn get_detail(&self, id: i64) -> Result<EncodeTaskDetail, RepositoryError>;

    /// List all tasks, newest first.
    async fn list(&self) -> Result<Vec<EncodeTask>, RepositoryError>;

    /// List tasks whose status is not `Complete`.
    async fn list_incomplete(&self) -> Result<Vec<EncodeTask>, RepositoryError>;

    /// Set a task's status without touching anything else.
    async fn set_status(&self, id: i64, status: TaskStatus) -> Result<(), RepositoryError>;

    /// Apply a worker progress update.
    ///
    /// Overwrites progress/fps/eta (absent fps and eta reset to 0 and -1),
    /// adopts the worker, overwrites encode parameters when present, and
    /// advances the status to `InProgress` if it is currently below it.
    async fn update_progress(
        &self,
        id: i64,
        worker: Option<&str>,
        update: &ProgressUpdate,
    ) -> Result<(), RepositoryError>;

    /// Record that a worker started downloading the source: adopt the
    /// worker, reset progress fields, stamp `encode_start_at`, and set the
    /// status to `Downloading`.
    async fn begin_download(&self, id: i64, worker: &str) -> Result<(), RepositoryError>;

    /// Set the status to `Uploading` while the artifact streams in.
    async fn begin_upload(&self, id: i64) -> Result<(), RepositoryError>;

    /// Finish the task: adopt the worker, stamp `encode_end_at`, and set
    /// the status to `Complete`. Safe to call repeatedly.
    async fn complete(&self, id: i64, worker: &str) -> Result<(), RepositoryError>;
}
