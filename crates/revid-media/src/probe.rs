//! ffprobe wrapper.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::command::{file_name, run_command, FFPROBE};
use crate::error::MediaError;
use crate::mediainfo;

/// Probed attributes of a media file.
///
/// Stream objects are kept as raw JSON the way ffprobe emitted them; typed
/// accessors pull out the handful of fields the pipeline cares about.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    pub path: PathBuf,
    pub format: Value,
    pub video_stream: Value,
    pub audio_streams: Vec<Value>,
    pub subtitle_streams: Vec<Value>,
    pub thumbnail_streams: Vec<Value>,
    pub width: i64,
    pub height: i64,
    pub duration: f64,
    /// Total frame count; mediainfo answers this far faster than ffprobe.
    pub frames: i64,
}

impl MediaProbe {
    /// Probe a file on disk.
    pub async fn load(path: &Path) -> Result<Self, MediaError> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-show_streams".into(),
            "-show_format".into(),
            "-of".into(),
            "json".into(),
            path.to_string_lossy().into_owned(),
        ];
        let output = run_command(FFPROBE, path, &args).await?;

        let parsed: Value =
            serde_json::from_str(&output.stdout_joined()).map_err(|e| MediaError::Parse {
                tool: FFPROBE,
                file: file_name(path),
                message: e.to_string(),
            })?;

        let frames = mediainfo::frame_count(path).await?;
        Self::from_json(path, &parsed, frames)
    }

    /// Build a probe from already-parsed ffprobe JSON.
    ///
    /// Split out from [`MediaProbe::load`] so parsing is testable without
    /// the binary.
    pub fn from_json(path: &Path, parsed: &Value, frames: i64) -> Result<Self, MediaError> {
        let file = file_name(path);

        let format = parsed.get("format").cloned().ok_or_else(|| MediaError::Parse {
            tool: FFPROBE,
            file: file.clone(),
            message: "missing format object".into(),
        })?;
        let streams = parsed
            .get("streams")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let codec_type = |s: &Value| {
            s.get("codec_type")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_ascii_lowercase()
        };

        let mut audio_streams: Vec<Value> = streams
            .iter()
            .filter(|s| codec_type(s) == "audio")
            .cloned()
            .collect();
        audio_streams.sort_by_key(|s| s.get("index").and_then(Value::as_i64).unwrap_or(0));

        let subtitle_streams: Vec<Value> = streams
            .iter()
            .filter(|s| codec_type(s) == "subtitle")
            .cloned()
            .collect();

        // Embedded thumbnails report codec_type "video" but carry an image
        // mimetype tag; they must not count as the video stream.
        let mut video_streams = Vec::new();
        let mut thumbnail_streams = Vec::new();
        for stream in streams.iter().filter(|s| codec_type(s) == "video") {
            let tags = stream.get("tags").cloned().unwrap_or_default();
            let mimetype = tags
                .get("mimetype")
                .or_else(|| tags.get("MIMETYPE"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_ascii_lowercase();
            if mimetype.contains("image") {
                thumbnail_streams.push(stream.clone());
            } else {
                video_streams.push(stream.clone());
            }
        }

        if video_streams.len() != 1 {
            return Err(MediaError::VideoStreamCount {
                file,
                count: video_streams.len(),
            });
        }
        let video_stream = video_streams.remove(0);

        let width = video_stream
            .get("width")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let height = video_stream
            .get("height")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let duration = format
            .get("duration")
            .and_then(Value::as_str)
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or(MediaError::NotAVideo { file })?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            video_stream,
            audio_streams,
            subtitle_streams,
            thumbnail_streams,
            width,
            height,
            duration,
            frames,
        })
    }

    /// Container size in bytes.
    pub fn size(&self) -> i64 {
        self.format
            .get("size")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    /// `r_frame_rate` parsed from its "num/den" form.
    pub fn frame_rate(&self) -> f64 {
        parse_rate(self.video_stream.get("r_frame_rate"))
    }

    /// `avg_frame_rate` parsed from its "num/den" form.
    pub fn avg_frame_rate(&self) -> f64 {
        parse_rate(self.video_stream.get("avg_frame_rate"))
    }

    /// Video field order; anything but "progressive" means interlaced
    /// content that needs deinterlacing.
    pub fn field_order(&self) -> &str {
        self.video_stream
            .get("field_order")
            .and_then(Value::as_str)
            .unwrap_or("progressive")
    }

    fn video_tag(&self, tag: &str) -> Option<&str> {
        self.video_stream
            .get("tags")
            .and_then(|t| t.get(tag))
            .and_then(Value::as_str)
    }

    /// Byte size of the video stream alone, from the mkvtoolnix statistics
    /// tag.
    pub fn video_stream_bytes(&self) -> Result<f64, MediaError> {
        self.video_tag("NUMBER_OF_BYTES")
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| MediaError::MissingStatistics {
                file: file_name(&self.path),
                tag: "NUMBER_OF_BYTES",
            })
    }

    /// True when the mkvtoolnix statistics tags are present.
    pub fn has_track_statistics(&self) -> bool {
        let check = |stream: &Value| {
            stream
                .get("tags")
                .and_then(|t| t.get("_STATISTICS_WRITING_APP"))
                .is_some()
        };

        if !self.video_stream.is_null() {
            check(&self.video_stream)
        } else if let Some(first) = self.audio_streams.first() {
            check(first)
        } else if let Some(first) = self.subtitle_streams.first() {
            check(first)
        } else {
            false
        }
    }

    /// Typed view of the audio streams for the encode rules.
    pub fn audio_tracks(&self) -> Vec<crate::audio::AudioTrack> {
        self.audio_streams
            .iter()
            .map(|s| crate::audio::AudioTrack {
                channels: s.get("channels").and_then(Value::as_i64).unwrap_or(2),
                bitrate_kbps: s
                    .get("tags")
                    .and_then(|t| t.get("BPS"))
                    .and_then(Value::as_str)
                    .and_then(|b| b.parse::<i64>().ok())
                    .unwrap_or(0)
                    / 1000,
                codec: s
                    .get("codec_name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            })
            .collect()
    }

    /// Whole probe as a JSON value, for the file record's `probe_info`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "format": self.format,
            "streams": {
                "video": self.video_stream,
                "audio": self.audio_streams,
                "subtitle": self.subtitle_streams,
            },
        })
    }
}

fn parse_rate(value: Option<&Value>) -> f64 {
    let Some(raw) = value.and_then(Value::as_str) else {
        return 0.0;
    };
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(1.0);
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => raw.parse().unwrap_or(0.0),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// ffprobe-shaped JSON for a 1080p file with one audio track.
    pub fn probe_1080p() -> MediaProbe {
        let parsed = serde_json::json!({
            "format": {"duration": "120.000000", "size": "8000000"},
            "streams": [
                {
                    "index": 0,
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "24000/1001",
                    "avg_frame_rate": "24000/1001",
                    "field_order": "progressive",
                    "tags": {
                        "NUMBER_OF_BYTES": "7200000",
                        "_STATISTICS_WRITING_APP": "mkvpropedit v70.0.0"
                    }
                },
                {
                    "index": 1,
                    "codec_type": "audio",
                    "codec_name": "dts",
                    "channels": 6,
                    "tags": {"BPS": "1509000"}
                }
            ]
        });
        MediaProbe::from_json(Path::new("/in/episode.mkv"), &parsed, 2877).unwrap()
    }
}
