//! HTTP transfers between worker and coordinator.
//!
//! Downloads and uploads stream in small chunks and retry transient
//! failures forever with a fixed back-off; the only terminal outcome is a
//! 404, which means the task was deleted while in flight.

use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::agent::WorkerContext;
use crate::error::WorkerError;

/// Transfer chunk size.
const CHUNK_BYTES: usize = 8 * 1024;

enum Attempt {
    /// Retry after the back-off.
    Transient(String),
    /// The task record is gone; give up on the message.
    Gone,
}

fn retry_delay(ctx: &WorkerContext) -> Duration {
    Duration::from_secs(ctx.settings.retry_delay_secs)
}

/// GET a task detail document.
///
/// Unlike file transfers, a claim does not retry: a transient failure here
/// propagates, the message is returned to the queue, and the next delivery
/// retries naturally.
pub async fn claim<T: DeserializeOwned>(ctx: &WorkerContext, url: &str) -> Result<T, WorkerError> {
    let response = ctx.client.get(url).send().await.map_err(|e| WorkerError::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(WorkerError::TaskGone(url.to_string()));
    }
    if !response.status().is_success() {
        return Err(WorkerError::Http {
            url: url.to_string(),
            message: format!("status {}", response.status()),
        });
    }

    let body = response.text().await.map_err(|e| WorkerError::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&body).map_err(|e| WorkerError::BadDetail {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Stream a file from the coordinator into `dest`, retrying forever on
/// transient failures.
pub async fn download(ctx: &WorkerContext, url: &str, dest: &Path) -> Result<(), WorkerError> {
    debug!(url, "downloading file");

    loop {
        match try_download(ctx, url, dest).await {
            Ok(bytes) => {
                debug!(url, bytes, "download complete");
                return Ok(());
            }
            Err(Attempt::Gone) => return Err(WorkerError::TaskGone(url.to_string())),
            Err(Attempt::Transient(message)) => {
                warn!(
                    url,
                    message,
                    delay_secs = ctx.settings.retry_delay_secs,
                    "download failed; retrying"
                );
                tokio::time::sleep(retry_delay(ctx)).await;
            }
        }
    }
}

async fn try_download(ctx: &WorkerContext, url: &str, dest: &Path) -> Result<u64, Attempt> {
    let response = ctx
        .client
        .get(url)
        .header("Worker", &ctx.hostname)
        .send()
        .await
        .map_err(|e| Attempt::Transient(e.to_string()))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(Attempt::Gone);
    }
    if !response.status().is_success() {
        return Err(Attempt::Transient(format!("status {}", response.status())));
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Attempt::Transient(format!("creating [{}]: {e}", dest.display())))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        // A connection reset mid-body restarts the whole download.
        let bytes = chunk.map_err(|e| Attempt::Transient(e.to_string()))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| Attempt::Transient(format!("writing [{}]: {e}", dest.display())))?;
        written += bytes.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| Attempt::Transient(e.to_string()))?;
    Ok(written)
}

/// Stream a local file to the coordinator with `Worker` and `size`
/// headers, retrying forever on transient failures.
pub async fn upload(ctx: &WorkerContext, url: &str, path: &Path) -> Result<(), WorkerError> {
    let size = tokio::fs::metadata(path).await?.len();
    debug!(url, file = %path.display(), size, "uploading file");

    loop {
        let file = tokio::fs::File::open(path).await?;
        let stream = ReaderStream::with_capacity(file, CHUNK_BYTES);
        let body = reqwest::Body::wrap_stream(stream);

        let result = ctx
            .client
            .post(url)
            .header("Worker", &ctx.hostname)
            .header("size", size)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                return Err(WorkerError::TaskGone(url.to_string()));
            }
            Ok(response) => {
                warn!(
                    url,
                    status = %response.status(),
                    delay_secs = ctx.settings.retry_delay_secs,
                    "upload rejected; retrying"
                );
            }
            Err(e) => {
                warn!(
                    url,
                    error = %e,
                    delay_secs = ctx.settings.retry_delay_secs,
                    "could not reach coordinator; retrying"
                );
            }
        }
        tokio::time::sleep(retry_delay(ctx)).await;
    }
}

/// Fetch a small auxiliary file (e.g. a VMAF model) to `dest` unless it is
/// already present.
pub async fn fetch_if_missing(
    ctx: &WorkerContext,
    url: &str,
    dest: &Path,
) -> Result<(), WorkerError> {
    if dest.exists() {
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    loop {
        let result = ctx.client.get(url).send().await;
        match result {
            Ok(response) if response.status().is_success() => {
                let bytes = response.bytes().await.map_err(|e| WorkerError::Http {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
                tokio::fs::write(dest, &bytes).await?;
                debug!(url, dest = %dest.display(), "fetched auxiliary file");
                return Ok(());
            }
            Ok(response) => {
                warn!(url, status = %response.status(), "fetch failed; retrying");
            }
            Err(e) => {
                warn!(url, error = %e, "fetch failed; retrying");
            }
        }
        tokio::time::sleep(retry_delay(ctx)).await;
    }
}
