//! Error type for media tooling.

use thiserror::Error;

/// Errors from probing files or running the transcoder family.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} on [{file}] returned code [{code}]")]
    CommandFailed {
        tool: &'static str,
        file: String,
        code: i32,
    },

    #[error("could not parse {tool} output for [{file}]: {message}")]
    Parse {
        tool: &'static str,
        file: String,
        message: String,
    },

    #[error("file [{file}] is not a video")]
    NotAVideo { file: String },

    #[error("expected 1 video stream in [{file}]; got [{count}]")]
    VideoStreamCount { file: String, count: usize },

    #[error("unexpected video dimensions [{width}x{height}]")]
    UnexpectedDimensions { width: i64, height: i64 },

    #[error("file [{file}] is missing the [{tag}] statistics tag")]
    MissingStatistics { file: String, tag: &'static str },

    #[error("io error on [{file}]: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}
