//! Wire shape of the quality-analysis report.
//!
//! This matches the JSON emitted by ffmpeg's libvmaf filter with
//! `log_fmt=json`: a `frames` array of per-frame scores plus a
//! `pooled_metrics` object of per-metric summaries. Fields for disabled
//! metrics are simply absent.

use serde::{Deserialize, Serialize};

/// The full report uploaded by a metric worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmafReport {
    pub frames: Vec<ReportFrame>,
    pub pooled_metrics: ReportPooledMetrics,
}

/// One scored frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFrame {
    #[serde(rename = "frameNum")]
    pub frame_num: i64,
    pub metrics: ReportFrameMetrics,
}

/// Per-frame metric values; absent when the metric was not computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFrameMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmaf: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psnr_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_ms_ssim: Option<f64>,
}

/// Summaries computed by libvmaf itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportPooledMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmaf: Option<PooledSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psnr_y: Option<PooledSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_ms_ssim: Option<PooledSummary>,
}

/// Min/max/mean/harmonic-mean pool as reported by libvmaf.
///
/// The two "low" statistics are not part of the report; the aggregator
/// computes them from the frame scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PooledSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub harmonic_mean: f64,
}
