//! Metric task processing: download both files, run the quality filter,
//! upload the report.

use std::path::Path;
use tracing::info;

use revid_core::domain::MetricTaskDetail;
use revid_media::{
    default_thread_count, mediainfo, quality_command, vmaf_model_filename, vmaf_model_url,
    QualityJob,
};

use crate::agent::WorkerContext;
use crate::error::WorkerError;
use crate::reporter::ProgressReporter;
use crate::supervise::run_ffmpeg;
use crate::transfer;

const REPORT_NAME: &str = "report.json";

/// Process one metrics envelope end to end.
pub async fn process(
    ctx: &WorkerContext,
    detail_url: &str,
    task_dir: &Path,
) -> Result<(), WorkerError> {
    let detail: MetricTaskDetail = transfer::claim(ctx, detail_url).await?;

    // The reference and compressed artifact usually share a file name;
    // keep them apart in subdirectories.
    let reference = task_dir.join("source").join(&detail.source_file.name);
    let compressed = task_dir
        .join("compressed")
        .join(&detail.compressed_file.name);
    tokio::fs::create_dir_all(reference.parent().unwrap_or(task_dir)).await?;
    tokio::fs::create_dir_all(compressed.parent().unwrap_or(task_dir)).await?;

    transfer::download(ctx, &format!("{detail_url}/files/source"), &reference).await?;
    transfer::download(ctx, &format!("{detail_url}/files/compressed"), &compressed).await?;

    // The model file is tiny and immutable; cache it in the work root
    // across tasks. The filter references it by bare file name, so a copy
    // goes next to ffmpeg's working directory for this task.
    let model_name = vmaf_model_filename(detail.task.neg_mode);
    let model_cache = ctx.settings.paths.work.join(model_name);
    transfer::fetch_if_missing(ctx, &vmaf_model_url(detail.task.neg_mode), &model_cache).await?;
    let model_path = task_dir.join(model_name);
    tokio::fs::copy(&model_cache, &model_path).await?;

    // Deinterlace the reference path only when the reference is interlaced
    // and the compressed output is progressive.
    let reference_scan = mediainfo::scan_type(&reference).await?;
    let compressed_scan = mediainfo::scan_type(&compressed).await?;
    let deinterlace_reference = compressed_scan == "Progressive" && reference_scan != compressed_scan;

    let job = QualityJob {
        reference: &reference,
        compressed: &compressed,
        model_path: &model_path,
        psnr: detail.task.psnr,
        ms_ssim: detail.task.ms_ssim,
        subsample_rate: detail.task.subsample_rate,
        threads: default_thread_count(),
        deinterlace_reference,
        report_name: REPORT_NAME,
    };
    let args = quality_command(&job);

    info!(
        reference = %detail.source_file.name,
        compressed = %detail.compressed_file.name,
        "calculating quality scores"
    );

    let mut reporter = ProgressReporter::new(ctx, detail_url, detail.source_file.frames);
    let source_fps = (detail.source_file.frame_rate > 0.0).then_some(detail.source_file.frame_rate);
    run_ffmpeg(&args, task_dir, source_fps, &mut reporter).await?;

    let report = task_dir.join(REPORT_NAME);
    transfer::upload(ctx, &format!("{detail_url}/report"), &report).await?;
    Ok(())
}
