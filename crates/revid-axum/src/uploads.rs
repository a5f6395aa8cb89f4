//! Streaming request-body persistence.
//!
//! Artifact uploads are multi-GB; the body streams straight to disk and
//! is never buffered in memory. The caller compares the byte count
//! against the worker's `size` header afterwards.

use axum::body::Body;
use futures_util::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::HttpError;

/// Write a request body to `target`, creating parent directories, and
/// return the number of bytes written.
///
/// A transport error mid-stream removes the partial file and fails; the
/// worker retries the whole upload.
pub async fn stream_to_file(body: Body, target: &Path) -> Result<u64, HttpError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(target).await?;
    let mut stream = body.into_data_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                file.write_all(&bytes).await?;
                written += bytes.len() as u64;
            }
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(target).await;
                return Err(HttpError::BadRequest(format!("upload interrupted: {e}")));
            }
        }
    }

    file.flush().await?;
    Ok(written)
}

/// Required `size` header of artifact uploads.
pub fn expected_size(headers: &axum::http::HeaderMap) -> Result<u64, HttpError> {
    headers
        .get("size")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| HttpError::BadRequest("missing size header in request".into()))
}

/// Optional `Worker` identity header.
pub fn worker_header(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("Worker")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_body_to_disk_and_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deep/nested/artifact.mkv");

        let body = Body::from(vec![7u8; 10_000]);
        let written = stream_to_file(body, &target).await.unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 10_000);
    }

    #[test]
    fn size_header_is_mandatory() {
        let headers = axum::http::HeaderMap::new();
        assert!(expected_size(&headers).is_err());

        let mut headers = axum::http::HeaderMap::new();
        headers.insert("size", "1000000".parse().unwrap());
        assert_eq!(expected_size(&headers).unwrap(), 1_000_000);

        let mut headers = axum::http::HeaderMap::new();
        headers.insert("size", "not-a-number".parse().unwrap());
        assert!(expected_size(&headers).is_err());
    }
}
