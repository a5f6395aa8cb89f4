//! Shared application state.

use std::sync::Arc;

use tracing::{info, warn};

use revid_core::{
    EncodeTaskRepository, Envelope, MetricTaskRepository, QueueError, Repos, Settings, TaskQueue,
    TaskStatus,
};

/// Explicitly constructed context passed to every handler.
///
/// There are no process-wide singletons; the settings, repositories, and
/// queue handle are wired once at startup and shared through this struct.
pub struct AppContext {
    pub settings: Settings,
    pub repos: Repos,
    pub queue: Arc<dyn TaskQueue>,
}

/// Application state shared across all handlers.
pub type AppState = Arc<AppContext>;

impl AppContext {
    /// Absolute task-detail URL for an encode task, as embedded in queue
    /// envelopes.
    pub fn encode_task_url(&self, id: i64) -> String {
        format!("{}/api/encodes/tasks/{id}", self.settings.http.public_url)
    }

    /// Absolute task-detail URL for a metric task.
    pub fn metric_task_url(&self, id: i64) -> String {
        format!("{}/api/metrics/tasks/{id}", self.settings.http.public_url)
    }

    /// Publish an encode task envelope and mark the task queued.
    pub async fn queue_encode_task(&self, id: i64) -> Result<(), QueueError> {
        info!(task = id, "queuing encode task");
        self.queue
            .publish(&Envelope::Encode {
                id,
                url: self.encode_task_url(id),
            })
            .await?;
        // Status flips only after the publish confirms. The envelope is
        // already durable at this point, so a failed write is logged
        // rather than unwinding the publish; the record catches up on the
        // worker's first GET.
        if let Err(e) = self
            .repos
            .encode_tasks
            .set_status(id, TaskStatus::Queued)
            .await
        {
            warn!(task = id, error = %e, "could not record queued status");
        }
        Ok(())
    }

    /// Publish a metric task envelope and mark the task queued.
    pub async fn queue_metric_task(&self, id: i64) -> Result<(), QueueError> {
        info!(task = id, "queuing metric task");
        self.queue
            .publish(&Envelope::Metrics {
                id,
                url: self.metric_task_url(id),
            })
            .await?;
        if let Err(e) = self
            .repos
            .metric_tasks
            .set_status(id, TaskStatus::Queued)
            .await
        {
            warn!(task = id, error = %e, "could not record queued status");
        }
        Ok(())
    }
}
