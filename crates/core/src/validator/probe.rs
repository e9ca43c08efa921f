//! Structural integrity probing.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::error::ValidatorError;

/// Checks that a media file can actually be decoded.
#[async_trait]
pub trait IntegrityProbe: Send + Sync {
    /// Returns `Ok` when the file has at least one decodable stream.
    async fn probe(&self, path: &Path) -> Result<(), ValidatorError>;
}

/// Probe backed by the `ffprobe` executable.
pub struct FfprobeProbe {
    ffprobe_path: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl IntegrityProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<(), ValidatorError> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration,size,bit_rate:stream=codec_type,codec_name",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ValidatorError::ProbeUnavailable {
                tool: self.ffprobe_path.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                path = %path.display(),
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "ffprobe rejected file"
            );
            return Err(ValidatorError::integrity(
                path,
                format!("ffprobe failed, file may be corrupted: {}", stderr.trim()),
            ));
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Applies the stream, codec and duration rules to ffprobe JSON output.
pub fn parse_probe_output(path: &Path, output: &str) -> Result<(), ValidatorError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        #[serde(default)]
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize, Default)]
    struct ProbeFormat {
        duration: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
        ValidatorError::integrity(path, format!("Failed to parse ffprobe output: {}", e))
    })?;

    if probe.streams.is_empty() {
        return Err(ValidatorError::integrity(path, "no valid streams found"));
    }

    let has_codec = probe.streams.iter().any(|s| {
        s.codec_type.as_deref().is_some_and(|t| !t.is_empty())
            && s.codec_name.as_deref().is_some_and(|n| !n.is_empty())
    });
    if !has_codec {
        return Err(ValidatorError::integrity(
            path,
            "no valid codec information found",
        ));
    }

    match probe.format.duration.as_deref() {
        None | Some("") | Some("N/A") => Err(ValidatorError::integrity(
            path,
            "invalid or missing duration",
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "streams": [{"codec_name": "mp3", "codec_type": "audio"}],
        "format": {"duration": "215.3", "size": "3444", "bit_rate": "128000"}
    }"#;

    #[test]
    fn test_accepts_valid_output() {
        assert!(parse_probe_output(Path::new("a.mp3"), GOOD).is_ok());
    }

    #[test]
    fn test_rejects_no_streams() {
        let out = r#"{"streams": [], "format": {"duration": "1.0"}}"#;
        let err = parse_probe_output(Path::new("a.mp3"), out).unwrap_err();
        assert!(err.to_string().contains("no valid streams"));
    }

    #[test]
    fn test_rejects_missing_codec() {
        let out = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "1.0"}}"#;
        let err = parse_probe_output(Path::new("a.mp3"), out).unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().contains("codec"));
    }

    #[test]
    fn test_rejects_na_duration() {
        let out = r#"{"streams": [{"codec_name": "h264", "codec_type": "video"}], "format": {"duration": "N/A"}}"#;
        assert!(parse_probe_output(Path::new("a.mkv"), out).is_err());

        let out = r#"{"streams": [{"codec_name": "h264", "codec_type": "video"}], "format": {}}"#;
        assert!(parse_probe_output(Path::new("a.mkv"), out).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_probe_output(Path::new("a.mp3"), "not json").unwrap_err();
        assert!(err.is_integrity());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe-binary");
        let result = probe.probe(Path::new("a.mp3")).await;
        assert!(matches!(result, Err(ValidatorError::ProbeUnavailable { .. })));
    }
}
