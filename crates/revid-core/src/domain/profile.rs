//! Encode profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Video codec a profile encodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    H265,
}

impl Codec {
    /// The ffmpeg encoder implementing this codec.
    pub fn encoder(self) -> &'static str {
        match self {
            Codec::H264 => "libx264",
            Codec::H265 => "libx265",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::H264 => "h264",
            Codec::H265 => "h265",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264" => Ok(Codec::H264),
            "h265" => Ok(Codec::H265),
            other => Err(format!("unknown codec [{other}]; expected one of (h264,h265)")),
        }
    }
}

/// Rate-control mode for an encode.
///
/// Tasks inherit the profile's mode but may switch from `Crf` to `Abr`
/// mid-task when constant-quality output cannot satisfy the size budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodeMode {
    Crf,
    Abr,
}

impl EncodeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EncodeMode::Crf => "crf",
            EncodeMode::Abr => "abr",
        }
    }
}

impl fmt::Display for EncodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crf" => Ok(EncodeMode::Crf),
            "abr" => Ok(EncodeMode::Abr),
            other => Err(format!("unknown encode type [{other}]; expected one of (crf,abr)")),
        }
    }
}

/// An administratively created encode profile.
///
/// Immutable while any task referencing it is alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub codec: Codec,
    pub encode_type: EncodeMode,
    pub encode_value: i64,
    /// Encoder preset (e.g. "slow", "medium", "veryfast").
    pub preset: String,
    /// Encoder tune; only "film", "grain", and "animation" are passed through.
    pub tune: Option<String>,
    /// Free-form extra ffmpeg arguments appended to the encode command.
    pub extra_args: Option<String>,
    /// Copy the main audio track instead of re-encoding it.
    pub keep_original_main_audio: bool,
}

/// A profile that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub codec: Codec,
    pub encode_type: EncodeMode,
    pub encode_value: i64,
    pub preset: String,
    #[serde(default)]
    pub tune: Option<String>,
    #[serde(default)]
    pub extra_args: Option<String>,
    #[serde(default)]
    pub keep_original_main_audio: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trips_through_serde() {
        let json = serde_json::to_string(&Codec::H265).unwrap();
        assert_eq!(json, "\"h265\"");
        let back: Codec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Codec::H265);
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!("av1".parse::<Codec>().is_err());
        assert!(serde_json::from_str::<Codec>("\"av1\"").is_err());
    }

    #[test]
    fn encode_mode_names_match_wire_format() {
        assert_eq!(EncodeMode::Crf.as_str(), "crf");
        assert_eq!("abr".parse::<EncodeMode>().unwrap(), EncodeMode::Abr);
    }
}
