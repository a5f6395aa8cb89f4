//! Media tooling for the revid pipeline.
//!
//! Wraps the external binary family (ffmpeg, ffprobe, mediainfocli,
//! mkvpropedit) behind typed command builders and parsers. Nothing here
//! touches the network or the record store; the worker crate composes these
//! pieces into its encode and analysis runs.

pub mod audio;
pub mod command;
pub mod encode;
pub mod error;
pub mod mediainfo;
pub mod mkvtoolnix;
pub mod probe;
pub mod progress;
pub mod quality;
pub mod scene;

pub use audio::AudioTrack;
pub use command::{run_command, CommandOutput, FFMPEG, FFPROBE, MEDIAINFO, MKVPROPEDIT};
pub use encode::{
    crf_command, two_pass_commands, two_pass_log_cleanup, EncodeSettings, BASE_FFMPEG_ARGS,
};
pub use error::MediaError;
pub use probe::MediaProbe;
pub use progress::{BlockAssembler, ProgressBlock};
pub use quality::{
    default_thread_count, quality_command, vmaf_model_filename, vmaf_model_url, QualityJob,
};
pub use scene::ResolutionCategory;
