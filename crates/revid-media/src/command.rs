//! Generic subprocess execution for the probe-style tools.
//!
//! These tools (ffprobe, mediainfocli, mkvpropedit) run to completion and
//! are read whole; the long-running ffmpeg encodes are supervised
//! line-by-line in the worker instead.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::MediaError;

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const MEDIAINFO: &str = "mediainfocli";
pub const MKVPROPEDIT: &str = "mkvpropedit";

/// Captured output of a finished command.
#[derive(Debug)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// Entire stdout as one string.
    pub fn stdout_joined(&self) -> String {
        self.stdout.join("\n")
    }
}

/// Run `tool` against `file` with the given arguments and wait for it.
///
/// A non-zero exit logs whatever the tool printed and maps to
/// [`MediaError::CommandFailed`].
pub async fn run_command(
    tool: &'static str,
    file: &Path,
    args: &[String],
) -> Result<CommandOutput, MediaError> {
    debug!(tool, ?args, "running command");

    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| MediaError::Spawn { tool, source })?;

    let result = CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: lines(&output.stdout),
        stderr: lines(&output.stderr),
    };

    if result.code != 0 {
        if !result.stdout.is_empty() {
            debug!(tool, stdout = ?result.stdout, "failed command stdout");
        }
        if !result.stderr.is_empty() {
            debug!(tool, stderr = ?result.stderr, "failed command stderr");
        }
        return Err(MediaError::CommandFailed {
            tool,
            file: file_name(file),
            code: result.code,
        });
    }

    Ok(result)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}
