//! Extension-based classification and integrity validation.

use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use super::error::ValidatorError;
use super::format::detect_format;
use super::probe::{FfprobeProbe, IntegrityProbe};
use super::types::{FileDescriptor, MediaKind};
use crate::state;

/// Audio extensions recognised when none are configured.
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "wav", "m4a", "aac", "ogg", "opus", "wma", "aiff",
];

/// Video extensions recognised when none are configured.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "mov", "wmv", "webm", "m4v"];

/// Classifies and validates media files.
pub struct MediaValidator {
    audio_extensions: Vec<String>,
    video_extensions: Vec<String>,
    probe: Arc<dyn IntegrityProbe>,
}

impl MediaValidator {
    /// Creates a validator for the given extension sets.
    ///
    /// Extensions are matched case-insensitively, with or without a leading dot.
    pub fn new<A, V>(
        audio_extensions: A,
        video_extensions: V,
        probe: Arc<dyn IntegrityProbe>,
    ) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            audio_extensions: normalize_extensions(audio_extensions),
            video_extensions: normalize_extensions(video_extensions),
            probe,
        }
    }

    /// Creates a validator with the default extension sets and an ffprobe probe.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_AUDIO_EXTENSIONS.iter().copied(),
            DEFAULT_VIDEO_EXTENSIONS.iter().copied(),
            Arc::new(FfprobeProbe::default()),
        )
    }

    /// Classifies a path by its extension.
    pub fn classify_by_extension(&self, path: &Path) -> MediaKind {
        let Some(ext) = extension_of(path) else {
            return MediaKind::Unknown;
        };

        if self.audio_extensions.contains(&ext) {
            MediaKind::Audio
        } else if self.video_extensions.contains(&ext) {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }

    /// Recursively lists media files under `root`, sorted by path.
    ///
    /// Files that are not audio or video are left out without error.
    pub async fn scan_directory(
        &self,
        root: &Path,
    ) -> Result<Vec<FileDescriptor>, ValidatorError> {
        let root_buf = root.to_path_buf();

        let entries = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for entry in WalkDir::new(&root_buf) {
                let entry = entry.map_err(|e| ValidatorError::Scan {
                    root: root_buf.clone(),
                    reason: e.to_string(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let size = entry
                    .metadata()
                    .map_err(|e| ValidatorError::Scan {
                        root: root_buf.clone(),
                        reason: e.to_string(),
                    })?
                    .len();
                found.push((entry.into_path(), size));
            }
            Ok::<_, ValidatorError>(found)
        })
        .await
        .map_err(|e| ValidatorError::Scan {
            root: root.to_path_buf(),
            reason: format!("scan task failed: {}", e),
        })??;

        let mut files: Vec<FileDescriptor> = entries
            .into_iter()
            .filter_map(|(path, size)| {
                let kind = self.classify_by_extension(&path);
                if kind == MediaKind::Unknown {
                    return None;
                }
                let format = extension_of(&path).unwrap_or_default();
                Some(FileDescriptor {
                    path,
                    size,
                    kind,
                    format,
                })
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(root = %root.display(), count = files.len(), "Scanned input tree");
        Ok(files)
    }

    /// Computes the SHA-256 of a file for comparison with an expected value.
    pub async fn compute_checksum(&self, path: &Path) -> Result<String, ValidatorError> {
        Ok(state::calculate_checksum(path).await?)
    }

    /// Whether a file's content matches an expected checksum.
    pub async fn verify_checksum(
        &self,
        path: &Path,
        expected: &str,
    ) -> Result<bool, ValidatorError> {
        Ok(self.compute_checksum(path).await? == expected)
    }

    /// Checks that a file exists, is non-empty and passes the probe.
    pub async fn validate_integrity(&self, path: &Path) -> Result<FileDescriptor, ValidatorError> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ValidatorError::integrity(path, "file not found"));
            }
            Err(e) => return Err(ValidatorError::Io(e)),
        };

        if !meta.is_file() {
            return Err(ValidatorError::integrity(path, "not a regular file"));
        }
        if meta.len() == 0 {
            return Err(ValidatorError::integrity(path, "file is empty"));
        }

        self.probe.probe(path).await?;

        let format = match detect_format(path).await {
            Some(format) => format.to_string(),
            None => extension_of(path).unwrap_or_default(),
        };

        Ok(FileDescriptor {
            path: path.to_path_buf(),
            size: meta.len(),
            kind: self.classify_by_extension(path),
            format,
        })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

fn normalize_extensions<I>(extensions: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProbe;
    use tempfile::TempDir;

    fn validator(probe: MockProbe) -> MediaValidator {
        MediaValidator::new(["mp3", ".FLAC"], ["mkv"], Arc::new(probe))
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let v = validator(MockProbe::new());
        assert_eq!(v.classify_by_extension(Path::new("a.MP3")), MediaKind::Audio);
        assert_eq!(v.classify_by_extension(Path::new("b.flac")), MediaKind::Audio);
        assert_eq!(v.classify_by_extension(Path::new("c.Mkv")), MediaKind::Video);
        assert_eq!(v.classify_by_extension(Path::new("d.txt")), MediaKind::Unknown);
        assert_eq!(v.classify_by_extension(Path::new("noext")), MediaKind::Unknown);
    }

    #[tokio::test]
    async fn test_scan_skips_unknown_files() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("artist/album");
        tokio::fs::create_dir_all(&nested).await.unwrap();
        tokio::fs::write(nested.join("01.mp3"), "x").await.unwrap();
        tokio::fs::write(nested.join("cover.jpg"), "x").await.unwrap();
        tokio::fs::write(temp.path().join("film.mkv"), "xyz").await.unwrap();
        tokio::fs::write(temp.path().join("notes.txt"), "x").await.unwrap();

        let files = validator(MockProbe::new())
            .scan_directory(temp.path())
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        let film = files.iter().find(|f| f.kind == MediaKind::Video).unwrap();
        assert_eq!(film.size, 3);
        assert_eq!(film.format, "mkv");
        assert!(files.iter().any(|f| f.path == nested.join("01.mp3")));
    }

    #[tokio::test]
    async fn test_scan_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let result = validator(MockProbe::new())
            .scan_directory(&temp.path().join("missing"))
            .await;
        assert!(matches!(result, Err(ValidatorError::Scan { .. })));
    }

    #[tokio::test]
    async fn test_empty_file_fails_integrity() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("b.mp3");
        tokio::fs::write(&path, "").await.unwrap();

        let err = validator(MockProbe::new())
            .validate_integrity(&path)
            .await
            .unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn test_rejected_stream_is_integrity_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.mp3");
        tokio::fs::write(&path, "garbage").await.unwrap();

        let v = validator(MockProbe::new().reject(&path));
        assert!(v.validate_integrity(&path).await.unwrap_err().is_integrity());
    }

    #[tokio::test]
    async fn test_format_prefers_magic_number() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mislabelled.mp3");
        tokio::fs::write(&path, b"fLaC\0\0\0\x22").await.unwrap();

        let desc = validator(MockProbe::new())
            .validate_integrity(&path)
            .await
            .unwrap();
        assert_eq!(desc.format, "flac");
        assert_eq!(desc.kind, MediaKind::Audio);
    }

    #[tokio::test]
    async fn test_verify_checksum() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.mp3");
        tokio::fs::write(&path, "abc").await.unwrap();

        let v = validator(MockProbe::new());
        let sum = v.compute_checksum(&path).await.unwrap();
        assert!(v.verify_checksum(&path, &sum).await.unwrap());
        assert!(!v.verify_checksum(&path, "0000").await.unwrap());
    }
}
