//! Worker error type.

use thiserror::Error;

use revid_core::QueueError;
use revid_media::MediaError;

/// Errors while processing one claimed task.
///
/// Only [`WorkerError::TaskGone`] is terminal for the message (the task was
/// deleted mid-flight; the message is acknowledged and dropped). Everything
/// else propagates without an ack so the broker redelivers.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("task no longer exists at [{0}]")]
    TaskGone(String),

    #[error("request to [{url}] failed: {message}")]
    Http { url: String, message: String },

    #[error("could not parse task detail from [{url}]: {message}")]
    BadDetail { url: String, message: String },

    #[error("{tool} exited with code [{code}]")]
    ChildFailed { tool: &'static str, code: i32 },

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
