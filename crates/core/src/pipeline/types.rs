//! Batch result types.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::error::FileFailure;

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct BatchResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub dry_run: bool,
    /// Media files found by the scan.
    pub total: usize,
    /// Files that finished without error, skips included.
    pub successful: usize,
    pub failed: usize,
    /// Files left alone: output already up to date, or no processor.
    pub skipped: usize,
    pub audio_processed: usize,
    pub video_processed: usize,
    /// Operations recorded by a dry run.
    pub dry_run_operations: usize,
    /// The first failures, in completion order.
    pub errors: Vec<FileFailure>,
    /// Failures beyond those listed in `errors`.
    pub omitted_errors: usize,
}

impl BatchResult {
    /// Whether every file succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "Would process" } else { "Processed" };
        let mut line = format!(
            "{} {} files: {} succeeded ({} skipped), {} failed in {:.1}s",
            verb,
            self.total,
            self.successful,
            self.skipped,
            self.failed,
            self.duration.as_secs_f64()
        );
        if self.dry_run {
            line.push_str(&format!(", {} operations recorded", self.dry_run_operations));
        }
        line
    }
}
