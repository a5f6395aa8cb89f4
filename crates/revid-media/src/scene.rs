//! Scene-rule size budgets and encode levels.
//!
//! The release rules tie the compressed video stream's byte size to the
//! source stream's size by resolution category: 30% for 720p, 60% for
//! 1080p, 70% for 2160p. Sources are bucketed by width when the aspect
//! ratio is at least 1.78 (letterboxed widescreen keeps its width) and by
//! height otherwise.

use crate::error::MediaError;
use crate::probe::MediaProbe;

const HD: (i64, i64) = (1280, 720);
const FULL_HD: (i64, i64) = (1920, 1080);
const ULTRA_HD: (i64, i64) = (3840, 2160);

/// Resolution bucket a source falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionCategory {
    Hd720,
    FullHd1080,
    UltraHd2160,
}

impl ResolutionCategory {
    /// Allowed compressed-stream size as a fraction of the source stream.
    pub fn budget_ratio(self) -> f64 {
        match self {
            ResolutionCategory::Hd720 => 0.3,
            ResolutionCategory::FullHd1080 => 0.6,
            ResolutionCategory::UltraHd2160 => 0.7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResolutionCategory::Hd720 => "720p",
            ResolutionCategory::FullHd1080 => "1080p",
            ResolutionCategory::UltraHd2160 => "2160p",
        }
    }
}

/// Bucket a source by its dimensions.
///
/// Widths and heights that fit none of the buckets are an error rather
/// than a guess; an operator has to look at those files.
pub fn categorize(width: i64, height: i64) -> Result<ResolutionCategory, MediaError> {
    let aspect_ratio = (width as f64 / height as f64 * 100.0).round() / 100.0;

    let category = if aspect_ratio >= 1.78 {
        if width <= HD.0 {
            Some(ResolutionCategory::Hd720)
        } else if width == FULL_HD.0 {
            Some(ResolutionCategory::FullHd1080)
        } else if width == ULTRA_HD.0 {
            Some(ResolutionCategory::UltraHd2160)
        } else {
            None
        }
    } else if height <= HD.1 {
        Some(ResolutionCategory::Hd720)
    } else if height == FULL_HD.1 {
        Some(ResolutionCategory::FullHd1080)
    } else if height == ULTRA_HD.1 {
        Some(ResolutionCategory::UltraHd2160)
    } else {
        None
    };

    category.ok_or(MediaError::UnexpectedDimensions { width, height })
}

/// Maximum compressed video-stream size (bytes) allowed for a source.
pub fn max_video_stream_size(source: &MediaProbe) -> Result<i64, MediaError> {
    let category = categorize(source.width, source.height)?;
    let stream_bytes = source.video_stream_bytes()?;
    Ok((stream_bytes * category.budget_ratio()).floor() as i64)
}

/// Average bitrate (kbit/s) that spends exactly the size budget over the
/// source duration: `floor(budget_bytes * 8 / 1000 / duration)`.
pub fn scene_bitrate_kbps(budget_bytes: i64, duration_secs: f64) -> i64 {
    ((budget_bytes as f64 / 1000.0 * 8.0) / duration_secs).floor() as i64
}

/// Whether a finished encode's video stream fits the source's budget.
pub fn passes_scene_rules(
    source: &MediaProbe,
    compressed: &MediaProbe,
) -> Result<bool, MediaError> {
    let budget = max_video_stream_size(source)?;
    Ok(compressed.video_stream_bytes()? <= budget as f64)
}

/// Encoder level for the source's resolution and frame rate.
///
/// 720p gets 4.1; 1080p gets 4.2 above 30 fps, 4.1 otherwise; 2160p gets
/// 5.2 above 30 fps, 5.1 otherwise.
pub fn encode_level(height: i64, frame_rate: f64) -> &'static str {
    if height > 1080 {
        if frame_rate > 30.0 {
            "5.2"
        } else {
            "5.1"
        }
    } else if height > 720 && frame_rate > 30.0 {
        "4.2"
    } else {
        "4.1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_heights_map_to_their_category() {
        assert_eq!(categorize(1280, 720).unwrap(), ResolutionCategory::Hd720);
        assert_eq!(categorize(1920, 1080).unwrap(), ResolutionCategory::FullHd1080);
        assert_eq!(categorize(3840, 2160).unwrap(), ResolutionCategory::UltraHd2160);
    }

    #[test]
    fn narrow_aspect_ratio_buckets_by_height() {
        // 1440x1080 is 1.33:1; width would say 720p-ish but height wins.
        assert_eq!(categorize(1440, 1080).unwrap(), ResolutionCategory::FullHd1080);
        // Academy-ratio SD content lands in the 720p bucket by height.
        assert_eq!(categorize(960, 720).unwrap(), ResolutionCategory::Hd720);
    }

    #[test]
    fn scope_crops_keep_their_width_category() {
        // 2.39:1 widescreen: 1920x804 is a 1080p release by width.
        assert_eq!(categorize(1920, 804).unwrap(), ResolutionCategory::FullHd1080);
        assert_eq!(categorize(3840, 1608).unwrap(), ResolutionCategory::UltraHd2160);
    }

    #[test]
    fn odd_dimensions_are_an_error() {
        assert!(categorize(2560, 1440).is_err());
        assert!(categorize(1920, 900).is_err());
    }

    #[test]
    fn budget_ratios_per_category() {
        assert_eq!(ResolutionCategory::Hd720.budget_ratio(), 0.3);
        assert_eq!(ResolutionCategory::FullHd1080.budget_ratio(), 0.6);
        assert_eq!(ResolutionCategory::UltraHd2160.budget_ratio(), 0.7);
    }

    #[test]
    fn bitrate_spends_the_budget_over_the_duration() {
        // 4,320,000 bytes over 120 s: 4320 kB * 8 / 120 = 288 kbit/s.
        assert_eq!(scene_bitrate_kbps(4_320_000, 120.0), 288);
        // Flooring, never rounding up.
        assert_eq!(scene_bitrate_kbps(1_000_000, 3.0), 2666);
    }

    #[test]
    fn level_table() {
        assert_eq!(encode_level(720, 25.0), "4.1");
        assert_eq!(encode_level(720, 60.0), "4.1");
        assert_eq!(encode_level(1080, 23.976), "4.1");
        assert_eq!(encode_level(1080, 59.94), "4.2");
        assert_eq!(encode_level(2160, 24.0), "5.1");
        assert_eq!(encode_level(2160, 60.0), "5.2");
    }

    #[test]
    fn budget_uses_stream_bytes_not_container_bytes() {
        let source = crate::probe::fixtures::probe_1080p();
        // 7,200,000 video-stream bytes * 0.6
        assert_eq!(max_video_stream_size(&source).unwrap(), 4_320_000);
    }
}
