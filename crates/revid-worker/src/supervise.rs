//! ffmpeg subprocess supervision.
//!
//! The child's stdout carries the machine-readable progress stream and is
//! parsed line-by-line as it arrives; stderr is drained on a separate task
//! so neither pipe can fill and stall the encoder. Broker keep-alive needs
//! nothing here: the AMQP connection heartbeats on its own background
//! task, independent of how long the child runs.

use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error};

use revid_media::{BlockAssembler, FFMPEG};

use crate::error::WorkerError;
use crate::reporter::ProgressReporter;

/// Keep this many trailing stderr lines for failure diagnostics.
const STDERR_TAIL: usize = 200;

/// Run one ffmpeg invocation to completion, POSTing each assembled
/// progress block through the reporter.
pub async fn run_ffmpeg(
    args: &[String],
    current_dir: &Path,
    source_fps: Option<f64>,
    reporter: &mut ProgressReporter<'_>,
) -> Result<(), WorkerError> {
    debug!(?args, "running ffmpeg");

    let mut child = Command::new(FFMPEG)
        .args(args)
        .current_dir(current_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| revid_media::MediaError::Spawn {
            tool: FFMPEG,
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| WorkerError::Internal("child stdout was not captured".into()))?;
    let stderr = child.stderr.take();

    let stderr_task = tokio::spawn(async move {
        let mut tail: Vec<String> = Vec::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
        }
        tail
    });

    let mut assembler = BlockAssembler::new(source_fps);
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(block) = assembler.push_line(&line) {
            reporter.report(&block).await;
        }
    }

    let status = child.wait().await?;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        error!(code, stderr = ?stderr_tail, "ffmpeg failed");
        return Err(WorkerError::ChildFailed { tool: FFMPEG, code });
    }
    Ok(())
}
