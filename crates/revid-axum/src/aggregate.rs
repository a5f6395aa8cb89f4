//! Metric report aggregation.
//!
//! Turns an uploaded libvmaf report into `Frame` rows plus one pooled row
//! per enabled metric. Frame rows are replaced wholesale and pooled rows
//! upserted, so a re-POSTed report lands in exactly the same state.

use thiserror::Error;
use tracing::debug;

use revid_core::domain::{
    MetricKind, MetricTask, NewFrameScore, PooledMetric, PooledSummary, VmafReport,
};
use revid_core::{pooling, MetricTaskRepository, Repos, RepositoryError};

/// Errors while aggregating a report.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("report is missing frame values for enabled metric [{0}]")]
    MissingFrameMetric(&'static str),

    #[error("report is missing pooled metrics for enabled metric [{0}]")]
    MissingPooledMetric(&'static str),

    #[error("report contains no frames")]
    EmptyReport,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<AggregateError> for crate::error::HttpError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Repository(repo) => repo.into(),
            other => crate::error::HttpError::BadRequest(other.to_string()),
        }
    }
}

/// Ingest a parsed report for a task.
pub async fn ingest_report(
    repos: &Repos,
    task: &MetricTask,
    report: &VmafReport,
) -> Result<(), AggregateError> {
    if report.frames.is_empty() {
        return Err(AggregateError::EmptyReport);
    }

    debug!(task = task.id, frames = report.frames.len(), "parsing frame metrics");

    let mut rows = Vec::with_capacity(report.frames.len());
    let mut vmaf_scores = Vec::new();
    let mut psnr_scores = Vec::new();
    let mut ms_ssim_scores = Vec::new();

    for frame in &report.frames {
        let vmaf = if task.vmaf {
            let value = frame
                .metrics
                .vmaf
                .ok_or(AggregateError::MissingFrameMetric("vmaf"))?;
            vmaf_scores.push(value);
            Some(value)
        } else {
            None
        };
        let psnr = if task.psnr {
            let value = frame
                .metrics
                .psnr_y
                .ok_or(AggregateError::MissingFrameMetric("psnr"))?;
            psnr_scores.push(value);
            Some(value)
        } else {
            None
        };
        let ms_ssim = if task.ms_ssim {
            let value = frame
                .metrics
                .float_ms_ssim
                .ok_or(AggregateError::MissingFrameMetric("ms_ssim"))?;
            ms_ssim_scores.push(value);
            Some(value)
        } else {
            None
        };

        rows.push(NewFrameScore {
            frame_number: frame.frame_num,
            psnr,
            ms_ssim,
            vmaf,
        });
    }

    repos.metric_tasks.replace_frames(task.id, &rows).await?;

    debug!(task = task.id, "creating pooled metrics");

    if task.vmaf {
        let summary = report
            .pooled_metrics
            .vmaf
            .ok_or(AggregateError::MissingPooledMetric("vmaf"))?;
        store_pooled(repos, task.id, MetricKind::Vmaf, summary, &vmaf_scores).await?;
    }
    if task.psnr {
        let summary = report
            .pooled_metrics
            .psnr_y
            .ok_or(AggregateError::MissingPooledMetric("psnr"))?;
        store_pooled(repos, task.id, MetricKind::Psnr, summary, &psnr_scores).await?;
    }
    if task.ms_ssim {
        let summary = report
            .pooled_metrics
            .float_ms_ssim
            .ok_or(AggregateError::MissingPooledMetric("ms_ssim"))?;
        store_pooled(repos, task.id, MetricKind::MsSsim, summary, &ms_ssim_scores).await?;
    }

    Ok(())
}

async fn store_pooled(
    repos: &Repos,
    task_id: i64,
    kind: MetricKind,
    summary: PooledSummary,
    scores: &[f64],
) -> Result<(), AggregateError> {
    let pooled = PooledMetric {
        min: summary.min,
        max: summary.max,
        mean: summary.mean,
        harmonic_mean: summary.harmonic_mean,
        one_percent_low: pooling::one_percent_low(scores),
        point_one_percent_low: pooling::point_one_percent_low(scores),
    };
    repos.metric_tasks.upsert_pooled(task_id, kind, &pooled).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revid_core::domain::{NewMediaFile, NewMetricTask};
    use revid_core::FileRepository;
    use revid_db::{build_repos, setup_test_database};

    async fn seed(psnr: bool, ms_ssim: bool, vmaf: bool) -> (Repos, MetricTask) {
        let pool = setup_test_database().await.unwrap();
        let repos = build_repos(pool);

        let source = repos
            .files
            .get_or_create(&NewMediaFile {
                name: "src.mkv".into(),
                directory: "/in".into(),
                size: 1,
                duration: 10.0,
                frame_rate: 30.0,
                frames: 300,
                probe_info: None,
            })
            .await
            .unwrap();
        let compressed = repos
            .files
            .get_or_create(&NewMediaFile {
                name: "src.mkv".into(),
                directory: "/out/p".into(),
                size: 1,
                duration: 10.0,
                frame_rate: 30.0,
                frames: 300,
                probe_info: None,
            })
            .await
            .unwrap();
        let task = repos
            .metric_tasks
            .insert(&NewMetricTask {
                source_file_id: source.id,
                compressed_file_id: compressed.id,
                psnr,
                ms_ssim,
                vmaf,
                neg_mode: false,
                subsample_rate: 5,
            })
            .await
            .unwrap();
        (repos, task)
    }

    /// A 300-frame clip sampled every 5 frames: 60 report entries.
    fn sample_report() -> VmafReport {
        let frames = (0..60)
            .map(|i| {
                serde_json::json!({
                    "frameNum": i * 5,
                    "metrics": {
                        "vmaf": 90.0 + (i as f64) / 10.0,
                        "psnr_y": 40.0 + (i as f64) / 20.0,
                        "float_ms_ssim": 0.98 + (i as f64) / 10000.0
                    }
                })
            })
            .collect::<Vec<_>>();

        serde_json::from_value(serde_json::json!({
            "frames": frames,
            "pooled_metrics": {
                "vmaf": {"min": 90.0, "max": 95.9, "mean": 92.95, "harmonic_mean": 92.9},
                "psnr_y": {"min": 40.0, "max": 42.95, "mean": 41.5, "harmonic_mean": 41.45},
                "float_ms_ssim": {"min": 0.98, "max": 0.9859, "mean": 0.983, "harmonic_mean": 0.9829}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn subsampled_report_yields_one_row_per_entry_and_three_pooled_rows() {
        let (repos, task) = seed(true, true, true).await;

        ingest_report(&repos, &task, &sample_report()).await.unwrap();

        let frames = repos.metric_tasks.list_frames(task.id).await.unwrap();
        assert_eq!(frames.len(), 60);
        assert_eq!(frames[1].frame_number, 5);

        for kind in [MetricKind::Psnr, MetricKind::MsSsim, MetricKind::Vmaf] {
            assert!(repos
                .metric_tasks
                .get_pooled(task.id, kind)
                .await
                .unwrap()
                .is_some());
        }

        // 60 scores: the 1% low bucket is max(1, 60/100) = 1 element, so it
        // equals the single worst score.
        let vmaf = repos
            .metric_tasks
            .get_pooled(task.id, MetricKind::Vmaf)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vmaf.one_percent_low, 90.0);
        assert_eq!(vmaf.point_one_percent_low, 90.0);
        assert_eq!(vmaf.mean, 92.95);
    }

    #[tokio::test]
    async fn disabled_metrics_stay_null_and_unpooled() {
        let (repos, task) = seed(false, false, true).await;

        ingest_report(&repos, &task, &sample_report()).await.unwrap();

        let frames = repos.metric_tasks.list_frames(task.id).await.unwrap();
        assert!(frames.iter().all(|f| f.psnr.is_none() && f.ms_ssim.is_none()));
        assert!(frames.iter().all(|f| f.vmaf.is_some()));

        assert!(repos
            .metric_tasks
            .get_pooled(task.id, MetricKind::Psnr)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reingesting_a_report_is_idempotent() {
        let (repos, task) = seed(true, true, true).await;

        ingest_report(&repos, &task, &sample_report()).await.unwrap();
        ingest_report(&repos, &task, &sample_report()).await.unwrap();

        assert_eq!(repos.metric_tasks.list_frames(task.id).await.unwrap().len(), 60);
    }

    #[tokio::test]
    async fn missing_enabled_metric_is_rejected() {
        let (repos, task) = seed(true, true, true).await;

        let mut report = sample_report();
        report.frames[10].metrics.psnr_y = None;

        let err = ingest_report(&repos, &task, &report).await.unwrap_err();
        assert!(matches!(err, AggregateError::MissingFrameMetric("psnr")));
    }
}
