//! Metric task handlers.

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use revid_core::domain::{MetricKind, MetricTask, NewMetricTask, ProgressUpdate, VmafReport};
use revid_core::{FileRepository, MetricTaskRepository};

use super::{note_worker_change, stream_file_response};
use crate::aggregate;
use crate::error::HttpError;
use crate::state::AppState;
use crate::uploads::{expected_size, stream_to_file, worker_header};

/// GET /api/metrics/tasks
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<MetricTask>>, HttpError> {
    Ok(Json(state.repos.metric_tasks.list().await?))
}

/// GET /api/metrics/tasks/in-progress
pub async fn in_progress(
    State(state): State<AppState>,
) -> Result<Json<Vec<MetricTask>>, HttpError> {
    Ok(Json(state.repos.metric_tasks.list_incomplete().await?))
}

/// GET /api/metrics/tasks/{id}
pub async fn detail(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<Value>, HttpError> {
    let detail = state.repos.metric_tasks.get_detail(id).await?;
    let base = state.metric_task_url(id);

    let mut body = serde_json::to_value(&detail).map_err(|e| HttpError::Internal(e.to_string()))?;
    body["links"] = json!({
        "source": format!("{base}/files/source"),
        "compressed": format!("{base}/files/compressed"),
        "report": format!("{base}/report"),
    });

    // Pooled rows exist once the report has been ingested.
    let mut pooled = serde_json::Map::new();
    for kind in [MetricKind::Psnr, MetricKind::MsSsim, MetricKind::Vmaf] {
        if let Some(row) = state.repos.metric_tasks.get_pooled(id, kind).await? {
            pooled.insert(
                kind.as_str().to_string(),
                serde_json::to_value(&row).map_err(|e| HttpError::Internal(e.to_string()))?,
            );
        }
    }
    body["pooled_metrics"] = serde_json::Value::Object(pooled);

    Ok(Json(body))
}

/// POST /api/metrics/tasks/{id} - worker progress update.
pub async fn update(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, HttpError> {
    let task = state.repos.metric_tasks.get(id).await?;

    if body.get("progress").is_none() {
        warn!(task = id, "progress update missing [progress] key");
        return Err(HttpError::BadRequest("Missing data key [progress]".into()));
    }
    let update: ProgressUpdate = serde_json::from_value(body)
        .map_err(|e| HttpError::BadRequest(format!("bad progress body: {e}")))?;

    let worker = worker_header(&headers);
    note_worker_change(id, task.worker.as_deref(), worker.as_deref());

    state
        .repos
        .metric_tasks
        .update_progress(id, worker.as_deref(), &update)
        .await?;

    Ok(Json(json!({"message": "POST received successfully"})))
}

/// GET /api/metrics/tasks/{id}/files/source - stream the reference file.
pub async fn download_source(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let detail = state.repos.metric_tasks.get_detail(id).await?;

    if let Some(worker) = worker_header(&headers) {
        debug!(task = id, worker, "worker starting metric calculation");
        state.repos.metric_tasks.begin_download(id, &worker).await?;
    }

    stream_file_response(&detail.source_file.full_path()).await
}

/// GET /api/metrics/tasks/{id}/files/compressed - stream the compressed
/// file and stamp the analysis start time.
pub async fn download_compressed(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let detail = state.repos.metric_tasks.get_detail(id).await?;

    if let Some(worker) = worker_header(&headers) {
        debug!(task = id, worker, "worker downloading compressed file");
        state.repos.metric_tasks.begin_analysis(id, &worker).await?;
    }

    stream_file_response(&detail.compressed_file.full_path()).await
}

/// POST /api/metrics/tasks/{id}/report - streamed report upload.
pub async fn upload_report(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, HttpError> {
    let task = state.repos.metric_tasks.get(id).await?;
    let expected = expected_size(&headers)?;
    let worker = worker_header(&headers);

    debug!(task = id, "saving metric report");
    state.repos.metric_tasks.begin_upload(id).await?;

    // Scratch space inside the coordinator-owned output tree; the report
    // is parsed and deleted, never served.
    let report_path = state
        .settings
        .paths
        .output
        .join(".reports")
        .join(format!("report-{id}.json"));
    let written = stream_to_file(body, &report_path).await?;

    let outcome = if written == expected {
        let raw = tokio::fs::read_to_string(&report_path).await?;
        let report: VmafReport = serde_json::from_str(&raw)
            .map_err(|e| HttpError::BadRequest(format!("malformed metric report: {e}")))?;

        aggregate::ingest_report(&state.repos, &task, &report).await?;

        if let Some(worker) = &worker {
            state.repos.metric_tasks.complete(id, worker).await?;
        }
        info!(task = id, "metrics task completed");
        Ok(Json(json!({"success": "metrics report uploaded successfully"})))
    } else {
        warn!(
            task = id,
            expected, written, "report size mismatch; requeuing metric calculation"
        );
        state.queue_metric_task(id).await?;
        Ok(Json(json!({"success": "metrics report uploaded successfully"})))
    };

    let _ = tokio::fs::remove_file(&report_path).await;
    outcome
}

fn default_true() -> bool {
    true
}

fn default_subsample() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct MetricIngestRequest {
    pub source_file: i64,
    pub compressed_files: Vec<i64>,
    #[serde(default = "default_true")]
    pub psnr: bool,
    #[serde(default = "default_true")]
    pub ms_ssim: bool,
    #[serde(default = "default_true")]
    pub vmaf: bool,
    #[serde(default)]
    pub neg_mode: bool,
    #[serde(default = "default_subsample")]
    pub subsample_rate: i64,
}

/// POST /api/metrics/ingest - create and queue metric tasks, one per
/// compressed file, all against the same reference.
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<MetricIngestRequest>,
) -> Result<Json<Value>, HttpError> {
    if !(request.psnr || request.ms_ssim || request.vmaf) {
        return Err(HttpError::BadRequest(
            "at least one metric must be enabled".into(),
        ));
    }
    if request.subsample_rate < 1 {
        return Err(HttpError::BadRequest("subsample_rate must be >= 1".into()));
    }

    let source = state.repos.files.get(request.source_file).await?;

    let mut created = Vec::new();
    for file_id in &request.compressed_files {
        debug!(file = file_id, "creating metric task");
        let compressed = state.repos.files.get(*file_id).await?;

        let task = state
            .repos
            .metric_tasks
            .insert(&NewMetricTask {
                source_file_id: source.id,
                compressed_file_id: compressed.id,
                psnr: request.psnr,
                ms_ssim: request.ms_ssim,
                vmaf: request.vmaf,
                neg_mode: request.neg_mode,
                subsample_rate: request.subsample_rate,
            })
            .await?;

        state.queue_metric_task(task.id).await?;
        created.push(task.id);
    }

    Ok(Json(json!({"created": created})))
}
