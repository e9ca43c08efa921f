use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::processor::{AudioFormat, AudioSettings, FfmpegSettings, VideoCodec, VideoSettings};
use crate::storage::StorageConfig;
use crate::validator::{DEFAULT_AUDIO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where files come from and go to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Scratch space (default: `<output_dir>/.refinery`)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Checksum records (default: `<work_dir>/state`)
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

/// Batch behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub dry_run: bool,
    /// Per-file time limit in seconds (default: 30 minutes)
    #[serde(default = "default_file_timeout_secs")]
    pub file_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
    #[serde(default = "default_max_reported_errors")]
    pub max_reported_errors: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            dry_run: false,
            file_timeout_secs: default_file_timeout_secs(),
            verify_checksums: true,
            max_reported_errors: default_max_reported_errors(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_file_timeout_secs() -> u64 {
    30 * 60
}

fn default_max_reported_errors() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Audio conversion
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_audio_format")]
    pub output_format: AudioFormat,
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: Option<u32>,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: Option<u8>,
    #[serde(default = "default_audio_extensions")]
    pub extensions: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_format: default_audio_format(),
            bitrate_kbps: None,
            sample_rate_hz: default_sample_rate(),
            bit_depth: default_bit_depth(),
            extensions: default_audio_extensions(),
        }
    }
}

impl AudioConfig {
    pub fn settings(&self) -> AudioSettings {
        AudioSettings {
            format: self.output_format,
            bitrate_kbps: self.bitrate_kbps,
            sample_rate_hz: self.sample_rate_hz,
            bit_depth: self.bit_depth,
        }
    }
}

fn default_audio_format() -> AudioFormat {
    AudioFormat::Flac
}

fn default_sample_rate() -> Option<u32> {
    Some(44_100)
}

fn default_bit_depth() -> Option<u8> {
    Some(16)
}

fn default_audio_extensions() -> Vec<String> {
    DEFAULT_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Video conversion
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Container extension
    #[serde(default = "default_container")]
    pub output_format: String,
    #[serde(default = "default_video_codec")]
    pub video_codec: VideoCodec,
    #[serde(default = "default_video_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_crf")]
    pub crf: Option<u8>,
    #[serde(default = "default_video_audio_bitrate")]
    pub audio_bitrate_kbps: Option<u32>,
    #[serde(default = "default_video_extensions")]
    pub extensions: Vec<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_format: default_container(),
            video_codec: default_video_codec(),
            audio_codec: default_video_audio_codec(),
            crf: default_crf(),
            audio_bitrate_kbps: default_video_audio_bitrate(),
            extensions: default_video_extensions(),
        }
    }
}

impl VideoConfig {
    pub fn settings(&self) -> VideoSettings {
        VideoSettings {
            container: self.output_format.clone(),
            codec: self.video_codec,
            crf: self.crf,
            audio_codec: self.audio_codec.clone(),
            audio_bitrate_kbps: self.audio_bitrate_kbps,
        }
    }
}

fn default_container() -> String {
    "mkv".to_string()
}

fn default_video_codec() -> VideoCodec {
    VideoCodec::H264
}

fn default_video_audio_codec() -> String {
    "aac".to_string()
}

fn default_crf() -> Option<u8> {
    Some(23)
}

fn default_video_audio_bitrate() -> Option<u32> {
    Some(192)
}

fn default_video_extensions() -> Vec<String> {
    DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Output naming
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrganizationConfig {
    #[serde(default = "crate::pipeline::default_music_pattern")]
    pub music_pattern: String,
    #[serde(default = "crate::pipeline::default_video_pattern")]
    pub video_pattern: String,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            music_pattern: crate::pipeline::default_music_pattern(),
            video_pattern: crate::pipeline::default_video_pattern(),
        }
    }
}

/// External tools
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
    #[serde(default = "default_ffmpeg_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_ffmpeg_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl FfmpegConfig {
    pub fn settings(&self) -> FfmpegSettings {
        FfmpegSettings {
            ffmpeg_path: self.ffmpeg_path.clone(),
            log_level: self.log_level.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_ffmpeg_log_level() -> String {
    "error".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics export
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Write Prometheus text metrics here after the batch
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    /// Scratch directory, defaulting to `.refinery` inside the output directory.
    pub fn work_dir(&self) -> PathBuf {
        self.paths
            .work_dir
            .clone()
            .unwrap_or_else(|| self.paths.output_dir.join(".refinery"))
    }

    /// Checksum record directory, defaulting to `state` inside the work directory.
    pub fn state_dir(&self) -> PathBuf {
        self.paths
            .state_dir
            .clone()
            .unwrap_or_else(|| self.work_dir().join("state"))
    }

    /// Extensions the validator should recognise as audio.
    pub fn audio_extensions(&self) -> &[String] {
        if self.audio.enabled {
            &self.audio.extensions
        } else {
            &[]
        }
    }

    /// Extensions the validator should recognise as video.
    pub fn video_extensions(&self) -> &[String] {
        if self.video.enabled {
            &self.video.extensions
        } else {
            &[]
        }
    }

    /// Runtime settings for the pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.paths.input_dir, &self.paths.output_dir)
            .with_work_dir(self.work_dir())
            .with_concurrency(self.processing.concurrency)
            .with_dry_run(self.processing.dry_run)
            .with_file_timeout(Duration::from_secs(self.processing.file_timeout_secs))
            .with_verify_checksums(self.processing.verify_checksums)
            .with_max_reported_errors(self.processing.max_reported_errors)
            .with_patterns(
                self.organization.music_pattern.clone(),
                self.organization.video_pattern.clone(),
            )
            .with_storage(self.storage.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[paths]
input_dir = "/media/in"
output_dir = "/media/out"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.paths.input_dir, PathBuf::from("/media/in"));
        assert_eq!(config.processing.concurrency, 4);
        assert_eq!(config.processing.file_timeout_secs, 1800);
        assert!(config.processing.verify_checksums);
        assert_eq!(config.audio.output_format, AudioFormat::Flac);
        assert_eq!(config.video.output_format, "mkv");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.telemetry.metrics_file.is_none());
    }

    #[test]
    fn test_missing_paths_fails() {
        let result: Result<Config, _> = toml::from_str("[processing]\nconcurrency = 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_derived_directories() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.work_dir(), PathBuf::from("/media/out/.refinery"));
        assert_eq!(config.state_dir(), PathBuf::from("/media/out/.refinery/state"));
    }

    #[test]
    fn test_pipeline_config_projection() {
        let toml = format!(
            "{}\n[processing]\nconcurrency = 8\ndry_run = true\nfile_timeout_secs = 60\n\n[organization]\nmusic_pattern = \"{{artist}}/{{title}}\"\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let pipeline = config.pipeline_config();

        assert_eq!(pipeline.concurrency, 8);
        assert!(pipeline.dry_run);
        assert_eq!(pipeline.file_timeout, Duration::from_secs(60));
        assert_eq!(pipeline.music_pattern, "{artist}/{title}");
        assert_eq!(pipeline.staging_dir(), PathBuf::from("/media/out/.refinery/staging"));
    }

    #[test]
    fn test_disabled_kind_has_no_extensions() {
        let toml = format!("{}\n[video]\nenabled = false\n", MINIMAL);
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(config.video_extensions().is_empty());
        assert!(!config.audio_extensions().is_empty());
    }

    #[test]
    fn test_audio_settings_from_config() {
        let toml = format!(
            "{}\n[audio]\noutput_format = \"mp3\"\nbitrate_kbps = 320\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&toml).unwrap();
        let settings = config.audio.settings();
        assert_eq!(settings.format, AudioFormat::Mp3);
        assert_eq!(settings.bitrate_kbps, Some(320));
        assert_eq!(settings.sample_rate_hz, Some(44_100));
    }
}
