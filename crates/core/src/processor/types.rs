//! Conversion targets.

use serde::{Deserialize, Serialize};

/// Audio output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Mp3,
    Aac,
    Ogg,
    Opus,
    Wav,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg encoder for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Ogg => "libvorbis",
            Self::Opus => "libopus",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

/// Video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
    Copy,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
            Self::Copy => "copy",
        }
    }
}

/// How audio files are converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub format: AudioFormat,
    /// Bitrate for lossy formats.
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub sample_rate_hz: Option<u32>,
    /// Sample bit depth for FLAC output.
    #[serde(default)]
    pub bit_depth: Option<u8>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            format: AudioFormat::Flac,
            bitrate_kbps: None,
            sample_rate_hz: Some(44_100),
            bit_depth: Some(16),
        }
    }
}

/// How video files are converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Container extension, e.g. `mkv`.
    pub container: String,
    pub codec: VideoCodec,
    #[serde(default)]
    pub crf: Option<u8>,
    /// ffmpeg audio encoder for the audio track.
    pub audio_codec: String,
    #[serde(default)]
    pub audio_bitrate_kbps: Option<u32>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            container: "mkv".to_string(),
            codec: VideoCodec::H264,
            crf: Some(23),
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: Some(192),
        }
    }
}
