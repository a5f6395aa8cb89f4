//! Encode and metric task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::MediaFile;
use super::profile::{EncodeMode, Profile};

/// Lifecycle of a task, shared by encode and metric tasks.
///
/// The coordinator assigns `Created`; the worker drives `Downloading`
/// through `Uploading` via side effects on its GET/POST calls; `Complete`
/// is set only after the resulting artifact has been persisted. A requeue
/// (size-mismatched upload, worker crash) resets the task to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum TaskStatus {
    Created,
    Queued,
    Downloading,
    InProgress,
    Uploading,
    Complete,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Created => "Created",
            TaskStatus::Queued => "Queued",
            TaskStatus::Downloading => "Downloading",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Uploading => "Uploading",
            TaskStatus::Complete => "Complete",
        }
    }
}

impl From<TaskStatus> for i64 {
    fn from(status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Created => 0,
            TaskStatus::Queued => 1,
            TaskStatus::Downloading => 2,
            TaskStatus::InProgress => 3,
            TaskStatus::Uploading => 4,
            TaskStatus::Complete => 5,
        }
    }
}

impl TryFrom<i64> for TaskStatus {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TaskStatus::Created),
            1 => Ok(TaskStatus::Queued),
            2 => Ok(TaskStatus::Downloading),
            3 => Ok(TaskStatus::InProgress),
            4 => Ok(TaskStatus::Uploading),
            5 => Ok(TaskStatus::Complete),
            other => Err(format!("unknown task status [{other}]")),
        }
    }
}

/// A persisted encode task (flat row; file and profile referenced by ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeTask {
    pub id: i64,
    pub source_file_id: i64,
    pub compressed_file_id: Option<i64>,
    pub profile_id: i64,
    /// Inherited from the profile but overridden when the control loop
    /// escalates (e.g. CRF 18 → 19, or CRF → two-pass ABR).
    pub encode_type: EncodeMode,
    pub encode_value: i64,
    pub worker: Option<String>,
    pub status: TaskStatus,
    pub progress: f64,
    pub encode_framerate: f64,
    pub seconds_remaining: i64,
    pub created_at: DateTime<Utc>,
    pub encode_start_at: Option<DateTime<Utc>>,
    pub encode_end_at: Option<DateTime<Utc>>,
}

/// An encode task to be inserted (no ID yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEncodeTask {
    pub source_file_id: i64,
    pub compressed_file_id: Option<i64>,
    pub profile_id: i64,
    pub encode_type: EncodeMode,
    pub encode_value: i64,
}

/// An encode task with its referenced records loaded.
///
/// This is the shape served to workers on task-detail GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeTaskDetail {
    #[serde(flatten)]
    pub task: EncodeTask,
    pub source_file: MediaFile,
    pub compressed_file: Option<MediaFile>,
    pub profile: Profile,
}

/// A persisted metric task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTask {
    pub id: i64,
    pub source_file_id: i64,
    pub compressed_file_id: i64,
    /// Per-metric enablement; at least one is true.
    pub psnr: bool,
    pub ms_ssim: bool,
    pub vmaf: bool,
    /// Use the "no enhancement gain" VMAF model variant.
    pub neg_mode: bool,
    /// Sample every N frames; 1 scores all frames.
    pub subsample_rate: i64,
    pub worker: Option<String>,
    pub status: TaskStatus,
    pub progress: f64,
    pub processing_framerate: f64,
    pub seconds_remaining: i64,
    pub created_at: DateTime<Utc>,
    pub analyze_start_at: Option<DateTime<Utc>>,
    pub analyze_end_at: Option<DateTime<Utc>>,
}

/// A metric task to be inserted (no ID yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetricTask {
    pub source_file_id: i64,
    pub compressed_file_id: i64,
    pub psnr: bool,
    pub ms_ssim: bool,
    pub vmaf: bool,
    pub neg_mode: bool,
    pub subsample_rate: i64,
}

/// A metric task with both referenced files loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricTaskDetail {
    #[serde(flatten)]
    pub task: MetricTask,
    pub source_file: MediaFile,
    pub compressed_file: MediaFile,
}

/// Progress update POSTed by a worker to a task-detail endpoint.
///
/// `progress` is mandatory; everything else is optional because the first
/// seconds of an encode produce wildly inaccurate fps/eta values, and the
/// encode parameters are only sent when the control loop changes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encode_type: Option<EncodeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encode_value: Option<i64>,
}

/// Which per-frame metric a pooled row summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Psnr,
    MsSsim,
    Vmaf,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Psnr => "psnr",
            MetricKind::MsSsim => "ms_ssim",
            MetricKind::Vmaf => "vmaf",
        }
    }
}

/// Per-frame scores recorded from a metric report.
///
/// A metric column is null iff the task did not enable that metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameScore {
    pub id: i64,
    pub task_id: i64,
    pub frame_number: i64,
    pub psnr: Option<f64>,
    pub ms_ssim: Option<f64>,
    pub vmaf: Option<f64>,
}

/// A frame score to be inserted (no ID yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFrameScore {
    pub frame_number: i64,
    pub psnr: Option<f64>,
    pub ms_ssim: Option<f64>,
    pub vmaf: Option<f64>,
}

/// Aggregate statistics summarizing one metric across a task's frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledMetric {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub harmonic_mean: f64,
    pub one_percent_low: f64,
    pub point_one_percent_low: f64,
}
