//! Row mapping helpers for `SQLite` queries.

use chrono::{DateTime, Utc};
use sqlx::Row;

use revid_core::domain::{
    Codec, EncodeMode, EncodeTask, FrameScore, MediaFile, MetricTask, PooledMetric, Profile,
    TaskStatus,
};
use revid_core::RepositoryError;

/// Shared SELECT column list for file queries.
pub const FILE_COLUMNS: &str =
    "id, name, directory, size, duration, frame_rate, frames, probe_info";

/// Shared SELECT column list for profile queries.
pub const PROFILE_COLUMNS: &str = "id, name, description, codec, encode_type, encode_value, \
     preset, tune, extra_args, keep_original_main_audio";

/// Shared SELECT column list for encode-task queries.
pub const ENCODE_TASK_COLUMNS: &str = "id, source_file_id, compressed_file_id, profile_id, \
     encode_type, encode_value, worker, status, progress, encode_framerate, seconds_remaining, \
     created_at, encode_start_at, encode_end_at";

/// Shared SELECT column list for metric-task queries.
pub const METRIC_TASK_COLUMNS: &str = "id, source_file_id, compressed_file_id, psnr, ms_ssim, \
     vmaf, neg_mode, subsample_rate, worker, status, progress, processing_framerate, \
     seconds_remaining, created_at, analyze_start_at, analyze_end_at";

fn storage(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// Timestamps are stored as RFC 3339 text.
pub fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

pub fn row_to_file(row: &sqlx::sqlite::SqliteRow) -> Result<MediaFile, RepositoryError> {
    let probe_info: Option<String> = row.try_get("probe_info").map_err(storage)?;

    Ok(MediaFile {
        id: row.try_get("id").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        directory: row
            .try_get::<String, _>("directory")
            .map_err(storage)?
            .into(),
        size: row.try_get("size").map_err(storage)?,
        duration: row.try_get("duration").map_err(storage)?,
        frame_rate: row.try_get("frame_rate").map_err(storage)?,
        frames: row.try_get("frames").map_err(storage)?,
        probe_info: probe_info.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

pub fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, RepositoryError> {
    let codec: String = row.try_get("codec").map_err(storage)?;
    let encode_type: String = row.try_get("encode_type").map_err(storage)?;

    Ok(Profile {
        id: row.try_get("id").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        description: row.try_get("description").map_err(storage)?,
        codec: codec
            .parse::<Codec>()
            .map_err(RepositoryError::Serialization)?,
        encode_type: encode_type
            .parse::<EncodeMode>()
            .map_err(RepositoryError::Serialization)?,
        encode_value: row.try_get("encode_value").map_err(storage)?,
        preset: row.try_get("preset").map_err(storage)?,
        tune: row.try_get("tune").map_err(storage)?,
        extra_args: row.try_get("extra_args").map_err(storage)?,
        keep_original_main_audio: row
            .try_get::<i64, _>("keep_original_main_audio")
            .map_err(storage)?
            != 0,
    })
}

fn row_status(row: &sqlx::sqlite::SqliteRow) -> Result<TaskStatus, RepositoryError> {
    let raw: i64 = row.try_get("status").map_err(storage)?;
    TaskStatus::try_from(raw).map_err(RepositoryError::Serialization)
}

pub fn row_to_encode_task(row: &sqlx::sqlite::SqliteRow) -> Result<EncodeTask, RepositoryError> {
    let encode_type: String = row.try_get("encode_type").map_err(storage)?;

    Ok(EncodeTask {
        id: row.try_get("id").map_err(storage)?,
        source_file_id: row.try_get("source_file_id").map_err(storage)?,
        compressed_file_id: row.try_get("compressed_file_id").map_err(storage)?,
        profile_id: row.try_get("profile_id").map_err(storage)?,
        encode_type: encode_type
            .parse::<EncodeMode>()
            .map_err(RepositoryError::Serialization)?,
        encode_value: row.try_get("encode_value").map_err(storage)?,
        worker: row.try_get("worker").map_err(storage)?,
        status: row_status(row)?,
        progress: row.try_get("progress").map_err(storage)?,
        encode_framerate: row.try_get("encode_framerate").map_err(storage)?,
        seconds_remaining: row.try_get("seconds_remaining").map_err(storage)?,
        created_at: parse_datetime(row.try_get("created_at").map_err(storage)?)
            .unwrap_or_else(Utc::now),
        encode_start_at: parse_datetime(row.try_get("encode_start_at").map_err(storage)?),
        encode_end_at: parse_datetime(row.try_get("encode_end_at").map_err(storage)?),
    })
}

pub fn row_to_metric_task(row: &sqlx::sqlite::SqliteRow) -> Result<MetricTask, RepositoryError> {
    Ok(MetricTask {
        id: row.try_get("id").map_err(storage)?,
        source_file_id: row.try_get("source_file_id").map_err(storage)?,
        compressed_file_id: row.try_get("compressed_file_id").map_err(storage)?,
        psnr: row.try_get::<i64, _>("psnr").map_err(storage)? != 0,
        ms_ssim: row.try_get::<i64, _>("ms_ssim").map_err(storage)? != 0,
        vmaf: row.try_get::<i64, _>("vmaf").map_err(storage)? != 0,
        neg_mode: row.try_get::<i64, _>("neg_mode").map_err(storage)? != 0,
        subsample_rate: row.try_get("subsample_rate").map_err(storage)?,
        worker: row.try_get("worker").map_err(storage)?,
        status: row_status(row)?,
        progress: row.try_get("progress").map_err(storage)?,
        processing_framerate: row.try_get("processing_framerate").map_err(storage)?,
        seconds_remaining: row.try_get("seconds_remaining").map_err(storage)?,
        created_at: parse_datetime(row.try_get("created_at").map_err(storage)?)
            .unwrap_or_else(Utc::now),
        analyze_start_at: parse_datetime(row.try_get("analyze_start_at").map_err(storage)?),
        analyze_end_at: parse_datetime(row.try_get("analyze_end_at").map_err(storage)?),
    })
}

pub fn row_to_frame(row: &sqlx::sqlite::SqliteRow) -> Result<FrameScore, RepositoryError> {
    Ok(FrameScore {
        id: row.try_get("id").map_err(storage)?,
        task_id: row.try_get("task_id").map_err(storage)?,
        frame_number: row.try_get("frame_number").map_err(storage)?,
        psnr: row.try_get("psnr").map_err(storage)?,
        ms_ssim: row.try_get("ms_ssim").map_err(storage)?,
        vmaf: row.try_get("vmaf").map_err(storage)?,
    })
}

pub fn row_to_pooled(row: &sqlx::sqlite::SqliteRow) -> Result<PooledMetric, RepositoryError> {
    Ok(PooledMetric {
        min: row.try_get("min").map_err(storage)?,
        max: row.try_get("max").map_err(storage)?,
        mean: row.try_get("mean").map_err(storage)?,
        harmonic_mean: row.try_get("harmonic_mean").map_err(storage)?,
        one_percent_low: row.try_get("one_percent_low").map_err(storage)?,
        point_one_percent_low: row.try_get("point_one_percent_low").map_err(storage)?,
    })
}
