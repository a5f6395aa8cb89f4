//! Declarative audio encode rules.
//!
//! Everything re-encodes to AAC at 96 kb/s per channel:
//!
//! - main track with 6+ channels above 576 kb/s: 5.1 AAC at 576 kb/s, plus
//!   a stereo 192 kb/s compatibility track with +2 dB gain
//! - main track with 6+ channels at or below 576 kb/s: the stereo gain
//!   track becomes the main output
//! - stereo/mono AAC at or below 192 kb/s: copied untouched
//! - anything else stereo/mono: stereo AAC at 192 kb/s
//!
//! Secondary tracks follow the same table without the compatibility-track
//! rule. The gain compensates the loudness drop of a surround downmix.

const BITRATE_PER_CHANNEL: i64 = 96;

/// The attributes of one source audio stream the rules care about.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub channels: i64,
    /// From the mkvtoolnix BPS statistics tag, in kb/s.
    pub bitrate_kbps: i64,
    pub codec: String,
}

fn copy_args(input: usize, output: usize) -> Vec<String> {
    vec![
        "-map".into(),
        format!("0:a:{input}"),
        format!("-c:a:{output}"),
        "copy".into(),
    ]
}

fn five_point_one_args(input: usize, output: usize) -> Vec<String> {
    vec![
        "-map".into(),
        format!("0:a:{input}"),
        format!("-c:a:{output}"),
        "aac".into(),
        format!("-b:a:{output}"),
        format!("{}k", BITRATE_PER_CHANNEL * 6),
        format!("-ac:a:{output}"),
        "6".into(),
    ]
}

fn stereo_args(input: usize, output: usize, gain: bool) -> Vec<String> {
    let mut args = vec![
        "-map".into(),
        format!("0:a:{input}"),
        format!("-c:a:{output}"),
        "aac".into(),
        format!("-b:a:{output}"),
        format!("{}k", BITRATE_PER_CHANNEL * 2),
    ];
    if gain {
        args.push(format!("-filter:a:{output}"));
        args.push("volume=2dB".into());
    }
    args.push(format!("-ac:a:{output}"));
    args.push("2".into());
    args
}

/// Build the ffmpeg arguments for every output audio stream.
pub fn audio_arguments(tracks: &[AudioTrack], keep_original_main: bool) -> Vec<String> {
    let Some(main) = tracks.first() else {
        return Vec::new();
    };

    let mut args = Vec::new();
    let mut outputs = 0usize;
    let mut emit = |fragment: Vec<String>, outputs: &mut usize| {
        args.extend(fragment);
        *outputs += 1;
    };

    // Main track. A kept or 5.1 surround output gets a stereo
    // compatibility track alongside it.
    let mut surround_output = false;
    if keep_original_main {
        emit(copy_args(0, outputs), &mut outputs);
        surround_output = main.channels > 2;
    } else if main.channels >= 6 {
        if main.bitrate_kbps > 576 {
            emit(five_point_one_args(0, outputs), &mut outputs);
            surround_output = true;
        } else {
            emit(stereo_args(0, outputs, true), &mut outputs);
        }
    } else if main.bitrate_kbps > 192 {
        emit(stereo_args(0, outputs, false), &mut outputs);
    } else if main.codec == "aac" {
        emit(copy_args(0, outputs), &mut outputs);
    } else {
        emit(stereo_args(0, outputs, false), &mut outputs);
    }

    if surround_output {
        emit(stereo_args(0, outputs, true), &mut outputs);
    }

    // Secondary tracks.
    for (input, track) in tracks.iter().enumerate().skip(1) {
        if track.channels >= 6 {
            emit(stereo_args(input, outputs, true), &mut outputs);
        } else if track.bitrate_kbps >= 192 {
            emit(stereo_args(input, outputs, false), &mut outputs);
        } else if track.codec == "aac" {
            emit(copy_args(input, outputs), &mut outputs);
        } else {
            emit(stereo_args(input, outputs, false), &mut outputs);
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(channels: i64, bitrate_kbps: i64, codec: &str) -> AudioTrack {
        AudioTrack {
            channels,
            bitrate_kbps,
            codec: codec.into(),
        }
    }

    fn joined(tracks: &[AudioTrack], keep: bool) -> String {
        audio_arguments(tracks, keep).join(" ")
    }

    #[test]
    fn high_bitrate_surround_gets_5_1_plus_compatibility_stereo() {
        let args = joined(&[track(6, 1509, "dts")], false);
        assert_eq!(
            args,
            "-map 0:a:0 -c:a:0 aac -b:a:0 576k -ac:a:0 6 \
             -map 0:a:0 -c:a:1 aac -b:a:1 192k -filter:a:1 volume=2dB -ac:a:1 2"
        );
    }

    #[test]
    fn low_bitrate_surround_downmixes_without_a_second_track() {
        let args = joined(&[track(6, 448, "ac3")], false);
        assert_eq!(
            args,
            "-map 0:a:0 -c:a:0 aac -b:a:0 192k -filter:a:0 volume=2dB -ac:a:0 2"
        );
    }

    #[test]
    fn small_aac_stereo_is_copied() {
        let args = joined(&[track(2, 160, "aac")], false);
        assert_eq!(args, "-map 0:a:0 -c:a:0 copy");
    }

    #[test]
    fn large_or_foreign_stereo_is_reencoded() {
        assert_eq!(
            joined(&[track(2, 320, "aac")], false),
            "-map 0:a:0 -c:a:0 aac -b:a:0 192k -ac:a:0 2"
        );
        assert_eq!(
            joined(&[track(2, 160, "flac")], false),
            "-map 0:a:0 -c:a:0 aac -b:a:0 192k -ac:a:0 2"
        );
    }

    #[test]
    fn keep_original_copies_main_and_adds_compat_for_surround() {
        let args = joined(&[track(8, 3000, "truehd")], true);
        assert_eq!(
            args,
            "-map 0:a:0 -c:a:0 copy \
             -map 0:a:0 -c:a:1 aac -b:a:1 192k -filter:a:1 volume=2dB -ac:a:1 2"
        );
    }

    #[test]
    fn secondary_tracks_follow_the_table_with_running_output_indexes() {
        let args = joined(
            &[
                track(6, 1509, "dts"),      // 5.1 + compat
                track(6, 640, "ac3"),       // surround secondary -> stereo gain
                track(2, 128, "aac"),       // small aac -> copy
                track(2, 96, "vorbis"),     // foreign codec -> re-encode
            ],
            false,
        );
        assert_eq!(
            args,
            "-map 0:a:0 -c:a:0 aac -b:a:0 576k -ac:a:0 6 \
             -map 0:a:0 -c:a:1 aac -b:a:1 192k -filter:a:1 volume=2dB -ac:a:1 2 \
             -map 0:a:1 -c:a:2 aac -b:a:2 192k -filter:a:2 volume=2dB -ac:a:2 2 \
             -map 0:a:2 -c:a:3 copy \
             -map 0:a:3 -c:a:4 aac -b:a:4 192k -ac:a:4 2"
        );
    }

    #[test]
    fn no_audio_streams_yields_no_arguments() {
        assert!(audio_arguments(&[], false).is_empty());
    }
}
