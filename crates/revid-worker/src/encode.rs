//! Encode task processing: download, adaptive control loop, upload.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use revid_core::domain::{EncodeMode, EncodeTaskDetail};
use revid_media::{
    crf_command, mkvtoolnix, scene, two_pass_commands, two_pass_log_cleanup, EncodeSettings,
};

use crate::agent::WorkerContext;
use crate::error::WorkerError;
use crate::reporter::ProgressReporter;
use crate::supervise::run_ffmpeg;
use crate::transfer;

/// Constant-quality ceiling: past this the control loop gives up on CRF
/// and switches to two-pass ABR at the budget bitrate.
const MAX_CRF: i64 = 24;

/// Process one encode envelope end to end.
pub async fn process(
    ctx: &WorkerContext,
    detail_url: &str,
    task_dir: &Path,
) -> Result<(), WorkerError> {
    let detail: EncodeTaskDetail = transfer::claim(ctx, detail_url).await?;

    let input = task_dir.join(&detail.source_file.name);
    transfer::download(ctx, &format!("{detail_url}/file"), &input).await?;

    let output = run_control_loop(ctx, &detail, detail_url, &input, task_dir).await?;

    transfer::upload(ctx, &format!("{detail_url}/file"), &output).await?;
    Ok(())
}

/// The adaptive encode loop.
///
/// CRF profiles start at the profile's value and escalate one CRF step per
/// failed size check up to [`MAX_CRF`]; if even that is too large the task
/// switches permanently to two-pass ABR with the bitrate derived from the
/// size budget. ABR profiles go straight to the two-pass run. Parameter
/// changes ride along on the next progress update so the coordinator's
/// record reflects what actually encoded the artifact.
async fn run_control_loop(
    ctx: &WorkerContext,
    detail: &EncodeTaskDetail,
    detail_url: &str,
    input: &Path,
    task_dir: &Path,
) -> Result<PathBuf, WorkerError> {
    // Scene-rule checks need the video-stream byte counts, which only
    // exist once mkvpropedit has stamped statistics tags.
    let probe = mkvtoolnix::ensure_track_statistics(input).await?;
    let source_fps = probe.frame_rate();

    let output = task_dir.join(format!("enc_{}", detail.source_file.name));
    let settings = EncodeSettings {
        codec: detail.profile.codec,
        preset: &detail.profile.preset,
        tune: detail.profile.tune.as_deref(),
        extra_args: detail.profile.extra_args.as_deref(),
        keep_original_main_audio: detail.profile.keep_original_main_audio,
    };

    let mut reporter = ProgressReporter::new(ctx, detail_url, probe.frames);
    let mut mode = detail.task.encode_type;
    let mut value = detail.task.encode_value;

    loop {
        match mode {
            EncodeMode::Crf => {
                info!(
                    file = %detail.source_file.name,
                    crf = value,
                    "encoding single pass"
                );
                let args = crf_command(&probe, &output, &settings, value)?;
                run_encode_pass(&args, task_dir, source_fps, input, &output, &mut reporter)
                    .await?;

                let compressed_probe = mkvtoolnix::ensure_track_statistics(&output).await?;
                if scene::passes_scene_rules(&probe, &compressed_probe)? {
                    return Ok(output);
                }

                tokio::fs::remove_file(&output).await?;
                if value < MAX_CRF {
                    value += 1;
                    warn!(
                        file = %detail.source_file.name,
                        crf = value,
                        "output over size budget; escalating CRF"
                    );
                } else {
                    mode = EncodeMode::Abr;
                    let budget = scene::max_video_stream_size(&probe)?;
                    value = scene::scene_bitrate_kbps(budget, probe.duration);
                    warn!(
                        file = %detail.source_file.name,
                        bitrate = value,
                        "CRF ceiling reached; switching to two-pass ABR"
                    );
                }
                reporter.set_parameters(mode, value);
                reporter.reset_samples();
            }
            EncodeMode::Abr => {
                info!(
                    file = %detail.source_file.name,
                    bitrate = value,
                    "encoding two-pass ABR"
                );
                let (first, second) = two_pass_commands(&probe, &output, &settings, value)?;

                run_encode_pass(&first, task_dir, source_fps, input, &output, &mut reporter)
                    .await?;
                reporter.reset_samples();
                run_encode_pass(&second, task_dir, source_fps, input, &output, &mut reporter)
                    .await?;

                for log in two_pass_log_cleanup(task_dir, input) {
                    debug!(file = %log.display(), "removing two-pass log");
                    let _ = tokio::fs::remove_file(&log).await;
                }
                return Ok(output);
            }
        }
    }
}

/// One supervised ffmpeg pass. A failed child removes the partial input
/// and output before the error propagates, so nothing half-written
/// survives into a redelivery.
async fn run_encode_pass(
    args: &[String],
    task_dir: &Path,
    source_fps: f64,
    input: &Path,
    output: &Path,
    reporter: &mut ProgressReporter<'_>,
) -> Result<(), WorkerError> {
    let source_fps = (source_fps > 0.0).then_some(source_fps);

    match run_ffmpeg(args, task_dir, source_fps, reporter).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("encode failed; removing partial files");
            let _ = tokio::fs::remove_file(input).await;
            let _ = tokio::fs::remove_file(output).await;
            Err(e)
        }
    }
}
