//! Encode task handlers.

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use revid_core::domain::{
    EncodeTask, FinalizedFile, MediaFile, NewMediaFile, NewProfile, Profile, ProgressUpdate,
};
use revid_core::{EncodeTaskRepository, FileRepository, ProfileRepository};
use revid_media::MediaProbe;

use super::{note_worker_change, stream_file_response};
use crate::error::HttpError;
use crate::ingest;
use crate::state::AppState;
use crate::uploads::{expected_size, stream_to_file, worker_header};

/// GET /api/encodes/tasks
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<EncodeTask>>, HttpError> {
    Ok(Json(state.repos.encode_tasks.list().await?))
}

/// GET /api/encodes/tasks/in-progress
pub async fn in_progress(
    State(state): State<AppState>,
) -> Result<Json<Vec<EncodeTask>>, HttpError> {
    Ok(Json(state.repos.encode_tasks.list_incomplete().await?))
}

/// GET /api/encodes/tasks/{id}
///
/// Full task record with nested files and profile. The `Worker` header has
/// no side effect here.
pub async fn detail(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
) -> Result<Json<Value>, HttpError> {
    let detail = state.repos.encode_tasks.get_detail(id).await?;

    let mut body = serde_json::to_value(&detail).map_err(|e| HttpError::Internal(e.to_string()))?;
    body["links"] = json!({ "file": format!("{}/file", state.encode_task_url(id)) });
    Ok(Json(body))
}

/// POST /api/encodes/tasks/{id} - worker progress update.
pub async fn update(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, HttpError> {
    let task = state.repos.encode_tasks.get(id).await?;

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
        .encode_tasks
        .update_progress(id, worker.as_deref(), &update)
        .await?;

    Ok(Json(json!({"message": "POST received successfully"})))
}

/// GET /api/encodes/tasks/{id}/file - stream the source file.
///
/// A `Worker` header marks the start of an attempt: the task transitions
/// to Downloading, progress resets, and the start time is stamped.
pub async fn download_source(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let detail = state.repos.encode_tasks.get_detail(id).await?;

    if let Some(worker) = worker_header(&headers) {
        debug!(task = id, worker, "worker starting encode");
        state.repos.encode_tasks.begin_download(id, &worker).await?;
    }

    stream_file_response(&detail.source_file.full_path()).await
}

/// POST /api/encodes/tasks/{id}/file - streamed artifact upload.
pub async fn upload_artifact(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<i64>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Value>, HttpError> {
    let detail = state.repos.encode_tasks.get_detail(id).await?;
    let expected = expected_size(&headers)?;
    let worker = worker_header(&headers);

    let output_directory = state.settings.paths.output.join(&detail.profile.name);
    let compressed = ensure_compressed_record(&state, &detail.source_file, &output_directory)
        .await?;
    let target = compressed.full_path();

    debug!(
        task = id,
        target = %target.display(),
        "saving encode artifact"
    );
    state.repos.encode_tasks.begin_upload(id).await?;

    let written = stream_to_file(body, &target).await?;

    if written == expected {
        debug!(task = id, file = compressed.id, "updating artifact record");
        let probe = MediaProbe::load(&target).await?;
        state
            .repos
            .files
            .finalize(
                compressed.id,
                &FinalizedFile {
                    size: probe.size(),
                    duration: probe.duration,
                    frame_rate: (probe.avg_frame_rate() * 1000.0).round() / 1000.0,
                    frames: probe.frames,
                    probe_info: Some(probe.to_value()),
                },
            )
            .await?;

        if let Some(worker) = &worker {
            state.repos.encode_tasks.complete(id, worker).await?;
        }

        if state.settings.flags.auto_delete {
            let source = detail.source_file.full_path();
            if let Err(e) = tokio::fs::remove_file(&source).await {
                warn!(file = %source.display(), error = %e, "auto-delete failed");
            }
        }

        info!(task = id, "encode task completed");
    } else {
        warn!(
            task = id,
            expected, written, "artifact size mismatch; quarantining and requeuing"
        );

        let invalid_directory = state
            .settings
            .paths
            .output
            .join("invalid")
            .join(&detail.profile.name);
        tokio::fs::create_dir_all(&invalid_directory).await?;
        let quarantined = invalid_directory.join(&compressed.name);
        debug!(target = %quarantined.display(), "moving output to quarantine");
        tokio::fs::rename(&target, &quarantined).await?;

        state.queue_encode_task(id).await?;
    }

    // 200 either way: the worker's transfer is done and its message can be
    // acknowledged; a mismatch already requeued the task.
    Ok(Json(json!({"success": "file uploaded successfully"})))
}

/// The compressed-file record for a task, created as a placeholder when
/// ingest did not pre-create one.
async fn ensure_compressed_record(
    state: &AppState,
    source: &MediaFile,
    output_directory: &std::path::Path,
) -> Result<MediaFile, HttpError> {
    Ok(state
        .repos
        .files
        .get_or_create(&NewMediaFile::placeholder(
            source.name.clone(),
            output_directory,
        ))
        .await?)
}

#[derive(Debug, Deserialize)]
pub struct EncodeIngestRequest {
    pub profile: i64,
    pub files: Vec<String>,
}

/// POST /api/encodes/ingest - register files and queue encode tasks.
pub async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<EncodeIngestRequest>,
) -> Result<Json<Value>, HttpError> {
    let profile = state.repos.profiles.get(request.profile).await?;

    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for name in &request.files {
        debug!(file = name, "scanning for ingest");
        let path = state.settings.paths.input.join(name);

        let Some(source) = ingest::register_file(&state.repos, &path).await? else {
            warn!(file = name, "still being written; skipping");
            skipped.push(name.clone());
            continue;
        };

        let task = ingest::create_encode_task(&state, &profile, &source).await?;
        created.push(task.id);
    }

    Ok(Json(json!({"created": created, "skipped": skipped})))
}

/// GET /api/encodes/scan - register input files with no pending task.
pub async fn scan(State(state): State<AppState>) -> Result<Json<Vec<MediaFile>>, HttpError> {
    info!("checking for pending files to encode");
    let files = ingest::scan_input(
        &state.repos,
        &state.settings.paths.input,
        &state.settings.paths.output,
    )
    .await?;
    Ok(Json(files))
}

/// GET /api/encodes/profiles
pub async fn profiles(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, HttpError> {
    Ok(Json(state.repos.profiles.list().await?))
}

/// POST /api/encodes/profiles
pub async fn create_profile(
    State(state): State<AppState>,
    Json(profile): Json<NewProfile>,
) -> Result<Json<Profile>, HttpError> {
    Ok(Json(state.repos.profiles.insert(&profile).await?))
}
