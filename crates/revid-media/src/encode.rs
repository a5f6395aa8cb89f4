//! ffmpeg encode command builders.
//!
//! Commands are built as argv vectors, never shell strings. The caller
//! supplies a probe of the source (statistics tags already ensured) and
//! gets back the full argument list for `ffmpeg`.

use std::path::{Path, PathBuf};

use revid_core::domain::Codec;

use crate::audio::audio_arguments;
use crate::error::MediaError;
use crate::probe::MediaProbe;
use crate::scene;

/// Flags shared by every supervised ffmpeg invocation: machine-readable
/// progress on stdout, one update per second.
pub const BASE_FFMPEG_ARGS: &[&str] = &[
    "-progress",
    "-",
    "-nostats",
    "-hide_banner",
    "-y",
    "-stats_period",
    "1",
];

/// Prefix of the stats files a two-pass encode leaves in the working
/// directory.
pub const TWO_PASS_LOG_PREFIX: &str = "ffmpeg2pass-0";

/// Per-profile knobs for building encode commands.
#[derive(Debug, Clone)]
pub struct EncodeSettings<'a> {
    pub codec: Codec,
    pub preset: &'a str,
    pub tune: Option<&'a str>,
    pub extra_args: Option<&'a str>,
    pub keep_original_main_audio: bool,
}

enum RatePass {
    Crf(i64),
    AbrPass1(i64),
    AbrPass2(i64),
}

fn base_args() -> Vec<String> {
    BASE_FFMPEG_ARGS.iter().map(|s| (*s).to_string()).collect()
}

fn null_sink() -> &'static str {
    if cfg!(windows) {
        "NUL"
    } else {
        "/dev/null"
    }
}

/// Video stream arguments for one pass.
fn video_arguments(
    probe: &MediaProbe,
    settings: &EncodeSettings<'_>,
    pass: &RatePass,
) -> Vec<String> {
    let mut args = vec![
        "-map".into(),
        "0:v:0".into(),
        "-c:v:0".into(),
        settings.codec.encoder().into(),
        "-preset".into(),
        settings.preset.into(),
    ];

    if let Some(tune) = settings.tune {
        if matches!(tune, "film" | "grain" | "animation") {
            args.push("-tune".into());
            args.push(tune.into());
        }
    }

    let stem = probe
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "encode".into());

    let mut x265_parameters: Vec<String> = Vec::new();

    match pass {
        RatePass::Crf(crf) => {
            args.push("-crf".into());
            args.push(crf.to_string());
        }
        RatePass::AbrPass1(bitrate) => {
            args.push("-b:v".into());
            args.push(format!("{bitrate}k"));
            match settings.codec {
                Codec::H264 => {
                    args.push("-pass".into());
                    args.push("1".into());
                    args.push("-passlogfile".into());
                    args.push(stem.clone());
                }
                Codec::H265 => {
                    x265_parameters.push("pass=1".into());
                    x265_parameters.push(format!("stats={stem}.log"));
                }
            }
        }
        RatePass::AbrPass2(bitrate) => {
            args.push("-b:v".into());
            args.push(format!("{bitrate}k"));
            match settings.codec {
                Codec::H264 => {
                    args.push("-pass".into());
                    args.push("2".into());
                    args.push("-passlogfile".into());
                    args.push(stem.clone());
                }
                Codec::H265 => {
                    x265_parameters.push("pass=2".into());
                    x265_parameters.push(format!("stats={stem}.log"));
                }
            }
        }
    }

    let mut level = scene::encode_level(probe.height, probe.frame_rate());

    match settings.codec {
        Codec::H264 => {
            args.push("-level:v".into());
            args.push(level.into());
        }
        Codec::H265 => {
            // 10 bit output even for 8 bit sources.
            args.push("-pix_fmt".into());
            args.push("yuv420p10le".into());

            // Level 4.2 does not exist for h265; its 4.1 covers h264's 4.2.
            if level == "4.2" {
                level = "4.1";
            }
            x265_parameters.push("high-tier=1".into());
            x265_parameters.push(format!("level={level}"));
            args.push("-x265-params".into());
            args.push(x265_parameters.join(":"));
        }
    }

    args
}

/// `-vf bwdif=0` for interlaced sources; nothing otherwise. bwdif emits
/// one output frame per input frame, keeping frame counts comparable for
/// quality analysis.
fn filter_arguments(probe: &MediaProbe) -> Vec<String> {
    if probe.field_order() == "progressive" {
        Vec::new()
    } else {
        vec!["-vf".into(), "bwdif=0".into()]
    }
}

fn subtitle_arguments(probe: &MediaProbe) -> Vec<String> {
    if probe.subtitle_streams.is_empty() {
        Vec::new()
    } else {
        vec!["-map".into(), "0:s".into(), "-c:s".into(), "copy".into()]
    }
}

fn trailing_arguments(probe: &MediaProbe, settings: &EncodeSettings<'_>) -> Vec<String> {
    let mut args = filter_arguments(probe);
    args.extend(subtitle_arguments(probe));
    args.extend(audio_arguments(
        &probe.audio_tracks(),
        settings.keep_original_main_audio,
    ));
    if let Some(extra) = settings.extra_args {
        args.extend(extra.split_whitespace().map(String::from));
    }
    args
}

/// Single-pass constant-quality command.
pub fn crf_command(
    probe: &MediaProbe,
    output: &Path,
    settings: &EncodeSettings<'_>,
    crf: i64,
) -> Result<Vec<String>, MediaError> {
    let mut args = base_args();
    args.push("-i".into());
    args.push(probe.path.to_string_lossy().into_owned());
    args.push("-movflags".into());
    args.push("use_metadata_tags".into());
    args.extend(video_arguments(probe, settings, &RatePass::Crf(crf)));
    args.extend(trailing_arguments(probe, settings));
    args.push(output.to_string_lossy().into_owned());
    Ok(args)
}

/// Two-pass average-bitrate commands: analysis pass to the null sink,
/// encode pass producing the artifact.
pub fn two_pass_commands(
    probe: &MediaProbe,
    output: &Path,
    settings: &EncodeSettings<'_>,
    bitrate_kbps: i64,
) -> Result<(Vec<String>, Vec<String>), MediaError> {
    let mut first = base_args();
    first.push("-i".into());
    first.push(probe.path.to_string_lossy().into_owned());
    first.extend(video_arguments(
        probe,
        settings,
        &RatePass::AbrPass1(bitrate_kbps),
    ));
    first.push("-f".into());
    first.push("null".into());
    first.push(null_sink().into());

    let mut second = base_args();
    second.push("-i".into());
    second.push(probe.path.to_string_lossy().into_owned());
    second.push("-movflags".into());
    second.push("use_metadata_tags".into());
    second.extend(video_arguments(
        probe,
        settings,
        &RatePass::AbrPass2(bitrate_kbps),
    ));
    second.extend(trailing_arguments(probe, settings));
    second.push(output.to_string_lossy().into_owned());

    Ok((first, second))
}

/// Files a finished two-pass encode leaves behind in `directory`: the
/// `ffmpeg2pass-0*` logs plus x265 stats files for the source stem.
pub fn two_pass_log_cleanup(directory: &Path, source: &Path) -> Vec<PathBuf> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Ok(entries) = std::fs::read_dir(directory) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.starts_with(TWO_PASS_LOG_PREFIX)
                || (!stem.is_empty() && name.starts_with(&format!("{stem}.log")))
        })
        .collect()
}
