//! Configuration for the pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::StorageConfig;

/// Runtime settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the tree to scan.
    pub input_dir: PathBuf,
    /// Root of the organised output tree.
    pub output_dir: PathBuf,
    /// Scratch space; conversions are staged under `work_dir/staging`.
    pub work_dir: PathBuf,
    /// Number of files processed at once. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// Record mutations instead of performing them.
    pub dry_run: bool,
    /// Upper bound on the time spent on a single file.
    pub file_timeout: Duration,
    /// Re-hash existing outputs before skipping them.
    pub verify_checksums: bool,
    /// How many failures the batch result lists by name.
    pub max_reported_errors: usize,
    /// Pattern for audio output paths.
    pub music_pattern: String,
    /// Pattern for episodic video output paths.
    pub video_pattern: String,
    /// Storage tuning.
    pub storage: StorageConfig,
}

fn default_concurrency() -> usize {
    4
}

fn default_file_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_max_reported_errors() -> usize {
    10
}

pub(crate) fn default_music_pattern() -> String {
    "{artist}/{album}/{track} - {title}".to_string()
}

pub(crate) fn default_video_pattern() -> String {
    "{show}/Season {season}/{show} - S{season}E{episode}".to_string()
}

impl PipelineConfig {
    /// Creates a config with default settings for the given directories.
    ///
    /// The work directory defaults to `.refinery` inside the output directory.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            input_dir: input_dir.into(),
            work_dir: output_dir.join(".refinery"),
            output_dir,
            concurrency: default_concurrency(),
            dry_run: false,
            file_timeout: default_file_timeout(),
            verify_checksums: true,
            max_reported_errors: default_max_reported_errors(),
            music_pattern: default_music_pattern(),
            video_pattern: default_video_pattern(),
            storage: StorageConfig::default(),
        }
    }

    /// Sets the number of concurrent workers.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enables dry-run mode.
    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Sets the per-file timeout.
    pub fn with_file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = timeout;
        self
    }

    /// Sets the work directory.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    /// Sets the output path patterns.
    pub fn with_patterns(mut self, music: impl Into<String>, video: impl Into<String>) -> Self {
        self.music_pattern = music.into();
        self.video_pattern = video.into();
        self
    }

    /// Sets whether existing outputs are re-hashed before being skipped.
    pub fn with_verify_checksums(mut self, enabled: bool) -> Self {
        self.verify_checksums = enabled;
        self
    }

    /// Sets how many failures the batch result lists by name.
    pub fn with_max_reported_errors(mut self, limit: usize) -> Self {
        self.max_reported_errors = limit;
        self
    }

    /// Sets the storage configuration.
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// The directory conversions are written to before placement.
    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir.join("staging")
    }

    /// Worker count actually used: never zero.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new("/in", "/out");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.file_timeout, Duration::from_secs(1800));
        assert_eq!(config.max_reported_errors, 10);
        assert_eq!(config.work_dir, PathBuf::from("/out/.refinery"));
        assert_eq!(config.staging_dir(), PathBuf::from("/out/.refinery/staging"));
        assert!(!config.dry_run);
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let config = PipelineConfig::new("/in", "/out").with_concurrency(0);
        assert_eq!(config.effective_concurrency(), 1);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new("/in", "/out")
            .with_concurrency(8)
            .with_dry_run(true)
            .with_work_dir("/tmp/work")
            .with_patterns("{title}", "{show}");

        assert_eq!(config.concurrency, 8);
        assert!(config.dry_run);
        assert_eq!(config.work_dir, PathBuf::from("/tmp/work"));
        assert_eq!(config.music_pattern, "{title}");
    }
}
