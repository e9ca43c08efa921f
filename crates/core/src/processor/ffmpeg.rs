//! FFmpeg-based processor implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::ProcessorError;
use super::traits::Processor;
use super::types::{AudioFormat, AudioSettings, VideoCodec, VideoSettings};
use crate::metadata::Metadata;

const STDERR_TAIL_LINES: usize = 20;

/// Settings shared by every ffmpeg invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FfmpegSettings {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional arguments inserted before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Audio(AudioSettings),
    Video(VideoSettings),
}

/// Converts files with the `ffmpeg` executable.
pub struct FfmpegProcessor {
    name: String,
    accepts: Vec<String>,
    target: Target,
    settings: FfmpegSettings,
}

impl FfmpegProcessor {
    /// Creates an audio processor for input files with the given extensions.
    pub fn audio<I>(audio: AudioSettings, settings: FfmpegSettings, accepts: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            name: format!("ffmpeg-audio-{}", audio.format.extension()),
            accepts: lowercase_all(accepts),
            target: Target::Audio(audio),
            settings,
        }
    }

    /// Creates a video processor for input files with the given extensions.
    pub fn video<I>(video: VideoSettings, settings: FfmpegSettings, accepts: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            name: format!("ffmpeg-video-{}", video.container),
            accepts: lowercase_all(accepts),
            target: Target::Video(video),
            settings,
        }
    }

    /// Builds ffmpeg arguments for audio conversion.
    fn build_audio_args(
        &self,
        input: &Path,
        output: &Path,
        audio: &AudioSettings,
        metadata_args: &[String],
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:a".to_string(),
            audio.format.ffmpeg_codec().to_string(),
        ];

        if audio.format == AudioFormat::Flac {
            if let Some(depth) = audio.bit_depth {
                args.extend(["-sample_fmt".to_string(), format!("s{}", depth)]);
            }
        } else if !audio.format.is_lossless() {
            if let Some(bitrate) = audio.bitrate_kbps {
                args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
            }
        }

        if let Some(rate) = audio.sample_rate_hz {
            args.extend(["-ar".to_string(), rate.to_string()]);
        }

        // Audio only, no cover art streams.
        args.push("-vn".to_string());

        self.finish_args(args, output, metadata_args)
    }

    /// Builds ffmpeg arguments for video conversion.
    fn build_video_args(
        &self,
        input: &Path,
        output: &Path,
        video: &VideoSettings,
        metadata_args: &[String],
    ) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            video.codec.ffmpeg_codec().to_string(),
        ];

        if video.codec != VideoCodec::Copy {
            if let Some(crf) = video.crf {
                args.extend(["-crf".to_string(), crf.to_string()]);
            }
        }

        args.extend(["-c:a".to_string(), video.audio_codec.clone()]);
        if let Some(bitrate) = video.audio_bitrate_kbps {
            args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
        }

        self.finish_args(args, output, metadata_args)
    }

    fn finish_args(
        &self,
        mut args: Vec<String>,
        output: &Path,
        metadata_args: &[String],
    ) -> Vec<String> {
        args.extend(metadata_args.iter().cloned());
        args.extend(["-loglevel".to_string(), self.settings.log_level.clone()]);
        args.extend(self.settings.extra_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());
        args
    }

    fn build_args(&self, input: &Path, output: &Path, metadata: &Metadata) -> Vec<String> {
        let metadata_args = metadata.to_ffmpeg_args();
        match &self.target {
            Target::Audio(audio) => self.build_audio_args(input, output, audio, &metadata_args),
            Target::Video(video) => self.build_video_args(input, output, video, &metadata_args),
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        metadata: &Metadata,
    ) -> Result<(), ProcessorError> {
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        let args = self.build_args(input, output, metadata);
        tracing::debug!(
            processor = %self.name,
            input = %input.display(),
            output = %output.display(),
            "Starting ffmpeg"
        );

        let child = Command::new(&self.settings.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessorError::ToolNotFound {
                        path: self.settings.ffmpeg_path.clone(),
                    }
                } else {
                    ProcessorError::Io(e)
                }
            })?;

        // Dropping the wait future drops the child, which kills it.
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = tokio::fs::remove_file(output).await;
                return Err(ProcessorError::Cancelled);
            }
            result = child.wait_with_output() => result?,
        };

        if !result.status.success() {
            let stderr = stderr_tail(&result.stderr);
            let _ = tokio::fs::remove_file(output).await;
            return Err(ProcessorError::conversion_failed(
                format!("ffmpeg exited with code: {:?}", result.status.code()),
                (!stderr.is_empty()).then_some(stderr),
            ));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(ProcessorError::MissingOutput {
                path: output.to_path_buf(),
            }),
        }
    }
}

#[async_trait]
impl Processor for FfmpegProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_process(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.accepts.contains(&ext))
    }

    fn output_extension(&self) -> &str {
        match &self.target {
            Target::Audio(audio) => audio.format.extension(),
            Target::Video(video) => &video.container,
        }
    }

    async fn process(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
    ) -> Result<(), ProcessorError> {
        self.run(cancel, input, output, &Metadata::default()).await
    }

    async fn process_with_metadata(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        metadata: &Metadata,
    ) -> Result<(), ProcessorError> {
        self.run(cancel, input, output, metadata).await
    }
}

fn lowercase_all<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim_start_matches('.').to_lowercase())
        .collect()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_processor(format: AudioFormat) -> FfmpegProcessor {
        FfmpegProcessor::audio(
            AudioSettings {
                format,
                bitrate_kbps: Some(320),
                sample_rate_hz: Some(44_100),
                bit_depth: Some(16),
            },
            FfmpegSettings::default(),
            ["mp3", "WAV"],
        )
    }

    #[test]
    fn test_can_process_by_extension() {
        let p = audio_processor(AudioFormat::Flac);
        assert!(p.can_process(Path::new("/in/a.MP3")));
        assert!(p.can_process(Path::new("/in/b.wav")));
        assert!(!p.can_process(Path::new("/in/c.mkv")));
        assert!(!p.can_process(Path::new("/in/noext")));
        assert_eq!(p.output_extension(), "flac");
    }

    #[test]
    fn test_flac_args() {
        let p = audio_processor(AudioFormat::Flac);
        let meta = Metadata {
            title: Some("Song".to_string()),
            ..Metadata::default()
        };
        let args = p.build_args(Path::new("in.mp3"), Path::new("out.flac"), &meta);

        assert_eq!(&args[..3], &["-y", "-i", "in.mp3"]);
        let joined = args.join(" ");
        assert!(joined.contains("-c:a flac"));
        assert!(joined.contains("-sample_fmt s16"));
        assert!(joined.contains("-ar 44100"));
        assert!(joined.contains("-metadata title=Song"));
        assert!(!joined.contains("-b:a"));
        assert_eq!(args.last().map(String::as_str), Some("out.flac"));
    }

    #[test]
    fn test_lossy_args_use_bitrate() {
        let p = audio_processor(AudioFormat::Mp3);
        let joined = p
            .build_args(Path::new("in.wav"), Path::new("out.mp3"), &Metadata::default())
            .join(" ");
        assert!(joined.contains("-c:a libmp3lame"));
        assert!(joined.contains("-b:a 320k"));
        assert!(!joined.contains("-sample_fmt"));
    }

    #[test]
    fn test_video_args() {
        let p = FfmpegProcessor::video(
            VideoSettings::default(),
            FfmpegSettings::default(),
            ["avi"],
        );
        assert_eq!(p.output_extension(), "mkv");

        let joined = p
            .build_args(Path::new("in.avi"), Path::new("out.mkv"), &Metadata::default())
            .join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-crf 23"));
        assert!(joined.contains("-c:a aac"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(text.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let p = FfmpegProcessor::audio(
            AudioSettings::default(),
            FfmpegSettings {
                ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg-binary"),
                ..FfmpegSettings::default()
            },
            ["mp3"],
        );
        let result = p
            .process(&CancellationToken::new(), Path::new("a.mp3"), Path::new("a.flac"))
            .await;
        assert!(matches!(result, Err(ProcessorError::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let p = audio_processor(AudioFormat::Flac);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = p
            .process(&cancel, Path::new("a.mp3"), Path::new("a.flac"))
            .await;
        assert!(matches!(result, Err(ProcessorError::Cancelled)));
    }
}
