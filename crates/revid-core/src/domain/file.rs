//! Registered media files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A media file registered with the coordinator.
///
/// A file is identified by its `(name, directory)` pair; many tasks may
/// reference the same file. A file whose `size` or `duration` is zero is
/// still being written by an external process and must not be handed to
/// workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Database ID.
    pub id: i64,
    /// File name including extension.
    pub name: String,
    /// Directory the file lives in (absolute).
    pub directory: PathBuf,
    /// Size in bytes.
    pub size: i64,
    /// Duration in seconds (millisecond precision).
    pub duration: f64,
    /// Average frame rate.
    pub frame_rate: f64,
    /// Total frame count.
    pub frames: i64,
    /// Raw probe output, kept opaque.
    pub probe_info: Option<serde_json::Value>,
}

impl MediaFile {
    /// Absolute path of the file on disk.
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// True while an external process is still writing the file.
    pub fn is_in_flight(&self) -> bool {
        self.size == 0 || self.duration == 0.0
    }
}

/// A media file that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaFile {
    pub name: String,
    pub directory: PathBuf,
    pub size: i64,
    pub duration: f64,
    pub frame_rate: f64,
    pub frames: i64,
    pub probe_info: Option<serde_json::Value>,
}

impl NewMediaFile {
    /// Placeholder record for an artifact that does not exist on disk yet.
    ///
    /// Size and duration stay zero until the upload lands and the file is
    /// finalized, which keeps the record flagged as in-flight.
    pub fn placeholder(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            size: 0,
            duration: 0.0,
            frame_rate: 0.0,
            frames: 0,
            probe_info: None,
        }
    }
}

/// Probed attributes written back onto a file record once its bytes are
/// fully on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedFile {
    pub size: i64,
    pub duration: f64,
    pub frame_rate: f64,
    pub frames: i64,
    pub probe_info: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_path_joins_directory_and_name() {
        let file = MediaFile {
            id: 1,
            name: "episode.mkv".into(),
            directory: "/media/input".into(),
            size: 100,
            duration: 60.0,
            frame_rate: 23.976,
            frames: 1439,
            probe_info: None,
        };
        assert_eq!(file.full_path(), PathBuf::from("/media/input/episode.mkv"));
    }

    #[test]
    fn zero_size_or_duration_is_in_flight() {
        let mut file = MediaFile {
            id: 1,
            name: "episode.mkv".into(),
            directory: "/media/input".into(),
            size: 0,
            duration: 60.0,
            frame_rate: 24.0,
            frames: 1440,
            probe_info: None,
        };
        assert!(file.is_in_flight());
        file.size = 100;
        assert!(!file.is_in_flight());
        file.duration = 0.0;
        assert!(file.is_in_flight());
    }
}
