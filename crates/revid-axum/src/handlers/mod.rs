//! API handlers.

pub mod encodes;
pub mod metrics;

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::error::HttpError;

/// Chunk size for streamed file responses.
const STREAM_CHUNK_BYTES: usize = 8 * 1024;

/// Stream a file from disk without buffering it.
pub(crate) async fn stream_file_response(path: &Path) -> Result<Response, HttpError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|_| HttpError::NotFound(format!("file [{}] not on disk", path.display())))?;
    let length = file.metadata().await?.len();

    let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_BYTES);
    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, length)
        .body(Body::from_stream(stream))
        .map_err(|e| HttpError::Internal(e.to_string()))
}

/// Log when a different worker than the recorded one reports in; the new
/// worker is adopted (redelivery after a crash moves the task).
pub(crate) fn note_worker_change(task_id: i64, recorded: Option<&str>, incoming: Option<&str>) {
    if let (Some(incoming), Some(recorded)) = (incoming, recorded) {
        if incoming != recorded {
            warn!(
                task = task_id,
                recorded, incoming, "task updates arriving from a different worker"
            );
        }
    }
}
