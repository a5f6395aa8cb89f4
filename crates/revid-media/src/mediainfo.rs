//! mediainfocli wrapper.
//!
//! Only two questions go through mediainfo: frame counts (roughly 30x
//! faster than asking ffprobe to count packets) and the scan type used to
//! decide deinterlacing on the quality-filter reference path.

use serde_json::Value;
use std::path::Path;

use crate::command::{file_name, run_command, MEDIAINFO};
use crate::error::MediaError;

/// Total frame count of the (single) video stream.
pub async fn frame_count(path: &Path) -> Result<i64, MediaError> {
    let args = vec![
        "--Inform=Video;%FrameCount%".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let output = run_command(MEDIAINFO, path, &args).await?;

    output
        .stdout
        .first()
        .and_then(|line| line.parse::<i64>().ok())
        .ok_or_else(|| MediaError::Parse {
            tool: MEDIAINFO,
            file: file_name(path),
            message: "could not read frame count".into(),
        })
}

/// The video track's `ScanType` ("Progressive", "Interlaced", ...); empty
/// when mediainfo does not report one.
pub async fn scan_type(path: &Path) -> Result<String, MediaError> {
    let args = vec![
        "--Output=JSON".to_string(),
        path.to_string_lossy().into_owned(),
    ];
    let output = run_command(MEDIAINFO, path, &args).await?;

    let parsed: Value =
        serde_json::from_str(&output.stdout_joined()).map_err(|e| MediaError::Parse {
            tool: MEDIAINFO,
            file: file_name(path),
            message: e.to_string(),
        })?;

    Ok(extract_scan_type(&parsed))
}

fn extract_scan_type(parsed: &Value) -> String {
    parsed
        .get("media")
        .and_then(|m| m.get("track"))
        .and_then(Value::as_array)
        .and_then(|tracks| {
            tracks.iter().find(|t| {
                t.get("@type")
                    .and_then(Value::as_str)
                    .is_some_and(|ty| ty.eq_ignore_ascii_case("video"))
            })
        })
        .and_then(|video| video.get("ScanType"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}
