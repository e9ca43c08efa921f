//! Pipeline orchestrator implementation.

use chrono::Utc;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::PipelineConfig;
use super::error::{FileFailure, PipelineError};
use super::paths::resolve_output_path;
use super::types::BatchResult;
use crate::metadata::{IntegrationSet, Metadata};
use crate::pool::{PoolError, WorkerPool};
use crate::processor::ProcessorRegistry;
use crate::state::StateManager;
use crate::storage::{StorageError, TransactionalStorage};
use crate::telemetry::{FileOutcome, NoopSink, ObservabilitySink};
use crate::validator::{FileDescriptor, MediaKind, MediaValidator};

/// Per-run counters shared by every task.
#[derive(Default)]
struct RunStats {
    skipped: AtomicUsize,
    dry_run: AtomicUsize,
    audio_processed: AtomicUsize,
    video_processed: AtomicUsize,
}

impl RunStats {
    fn record(&self, kind: MediaKind, outcome: FileOutcome) {
        let counter = match (outcome, kind) {
            (FileOutcome::Skipped, _) => &self.skipped,
            (FileOutcome::DryRun, _) => &self.dry_run,
            (FileOutcome::Processed, MediaKind::Video) => &self.video_processed,
            (FileOutcome::Processed, _) => &self.audio_processed,
            (FileOutcome::Failed, _) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a file task needs, shared across workers.
struct RunContext {
    config: PipelineConfig,
    validator: Arc<MediaValidator>,
    state: Arc<StateManager>,
    processors: ProcessorRegistry,
    integrations: IntegrationSet,
    storage: Arc<TransactionalStorage>,
    sink: Arc<dyn ObservabilitySink>,
    stats: RunStats,
}

/// Scans, converts and places one batch of media files.
///
/// A pipeline owns the storage journal for its run, so each run should use
/// a fresh pipeline. After a run, [`rollback`](Self::rollback) undoes every
/// placement it made.
pub struct Pipeline {
    config: PipelineConfig,
    validator: Arc<MediaValidator>,
    state: Arc<StateManager>,
    processors: ProcessorRegistry,
    integrations: IntegrationSet,
    storage: Arc<TransactionalStorage>,
    sink: Arc<dyn ObservabilitySink>,
}

impl Pipeline {
    /// Creates a new pipeline.
    pub fn new(
        config: PipelineConfig,
        validator: Arc<MediaValidator>,
        state: Arc<StateManager>,
        processors: ProcessorRegistry,
    ) -> Self {
        let storage = Arc::new(TransactionalStorage::new(
            config.storage.clone(),
            config.dry_run,
        ));

        Self {
            config,
            validator,
            state,
            processors,
            integrations: IntegrationSet::new(),
            storage,
            sink: Arc::new(NoopSink),
        }
    }

    /// Sets the metadata integrations.
    pub fn with_integrations(mut self, integrations: IntegrationSet) -> Self {
        self.integrations = integrations;
        self
    }

    /// Sets the observability sink.
    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The storage journal for this pipeline's run.
    pub fn storage(&self) -> &TransactionalStorage {
        &self.storage
    }

    /// Processes every media file under the input directory.
    ///
    /// Per-file failures are reported in the result. Only failures shared
    /// by the whole batch (directory setup, scan, pool creation) and
    /// cancellation during dispatch end the run with an error.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchResult, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(
            %run_id,
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            dry_run = self.config.dry_run,
            "Starting batch"
        );

        self.storage.create_dir(&self.config.output_dir).await?;
        self.storage.create_dir(&self.config.staging_dir()).await?;

        let files = self
            .validator
            .scan_directory(&self.config.input_dir)
            .await
            .map_err(|e| PipelineError::Scan {
                root: self.config.input_dir.clone(),
                source: e,
            })?;
        let total = files.len();

        let workers = self.config.effective_concurrency();
        let pool: WorkerPool<FileFailure> = WorkerPool::new(workers)?;
        tracing::info!(%run_id, files = total, workers, "Dispatching files");

        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            validator: Arc::clone(&self.validator),
            state: Arc::clone(&self.state),
            processors: self.processors.clone(),
            integrations: self.integrations.clone(),
            storage: Arc::clone(&self.storage),
            sink: Arc::clone(&self.sink),
            stats: RunStats::default(),
        });

        let mut stopped: Option<PoolError> = None;
        for file in files {
            let task_ctx = Arc::clone(&ctx);
            let task_cancel = cancel.clone();
            let task = async move { task_ctx.run_file(file, task_cancel).await };

            if let Err(e) = pool.submit(cancel, task).await {
                tracing::warn!(%run_id, error = %e, "Stopping dispatch");
                stopped = Some(e);
                break;
            }
        }

        let failures = pool.wait_with_errors().await;

        if let Some(e) = stopped {
            tracing::warn!(
                %run_id,
                drained = failures.len(),
                "Batch stopped before all files were dispatched"
            );
            return Err(match e {
                PoolError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Pool(other),
            });
        }

        let result = self
            .aggregate(&ctx, run_id, started_at, start, total, failures)
            .await;

        self.sink.increment_counter(
            "audio.processed",
            &[],
            result.audio_processed as u64,
        );
        self.sink.increment_counter(
            "video.processed",
            &[],
            result.video_processed as u64,
        );
        self.sink.record_event(
            "batch_completed",
            &[
                ("run_id", run_id.to_string()),
                ("total", result.total.to_string()),
                ("failed", result.failed.to_string()),
            ],
        );

        tracing::info!(%run_id, "{}", result.summary());
        Ok(result)
    }

    /// Undoes every completed placement of this pipeline's run.
    pub async fn rollback(&self) -> Result<usize, StorageError> {
        tracing::warn!("Rolling back batch");
        self.storage.rollback().await
    }

    async fn aggregate(
        &self,
        ctx: &RunContext,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
        total: usize,
        mut failures: Vec<FileFailure>,
    ) -> BatchResult {
        let failed = failures.len();
        let limit = self.config.max_reported_errors;
        let omitted_errors = failed.saturating_sub(limit);
        failures.truncate(limit);

        for failure in &failures {
            tracing::warn!(
                %run_id,
                path = %failure.path.display(),
                error = %failure.error,
                "File failed"
            );
        }
        if omitted_errors > 0 {
            tracing::warn!(%run_id, omitted = omitted_errors, "... and more failures");
        }

        let dry_run_operations = if self.config.dry_run {
            self.storage.operations().await.len()
        } else {
            0
        };

        BatchResult {
            run_id,
            started_at,
            duration: start.elapsed(),
            dry_run: self.config.dry_run,
            total,
            successful: total - failed,
            failed,
            skipped: ctx.stats.skipped.load(Ordering::Relaxed),
            audio_processed: ctx.stats.audio_processed.load(Ordering::Relaxed),
            video_processed: ctx.stats.video_processed.load(Ordering::Relaxed),
            dry_run_operations,
            errors: failures,
            omitted_errors,
        }
    }
}

impl RunContext {
    /// Runs one file and reports its outcome.
    async fn run_file(
        &self,
        file: FileDescriptor,
        cancel: CancellationToken,
    ) -> Result<(), FileFailure> {
        let started = Instant::now();
        let scope = cancel.child_token();
        let staging = self.config.staging_dir().join(Uuid::new_v4().to_string());

        let result = self.process_file(&file, &scope, &staging).await;

        let kind = file.kind.to_string();
        match result {
            Ok(outcome) => {
                tracing::debug!(path = %file.path.display(), %outcome, "File done");
                self.stats.record(file.kind, outcome);
                self.sink.record_file(&kind, outcome, started.elapsed());
                Ok(())
            }
            Err(error) => {
                if !self.config.dry_run {
                    remove_staged(&staging).await;
                }
                tracing::error!(path = %file.path.display(), error = %error, "File failed");
                self.sink.record_file(&kind, FileOutcome::Failed, started.elapsed());
                Err(FileFailure {
                    path: file.path,
                    error,
                })
            }
        }
    }

    /// Validates, converts and places one file.
    ///
    /// The per-file time limit covers every step up to and including the
    /// conversion. Placement and the checksum record run outside it.
    async fn process_file(
        &self,
        file: &FileDescriptor,
        cancel: &CancellationToken,
        staging: &Path,
    ) -> Result<FileOutcome, PipelineError> {
        let limit = TimeLimit::start(&file.path, self.config.file_timeout, cancel);

        let descriptor = limit
            .run(async {
                let validated = self.validator.validate_integrity(&file.path).await;
                validated.map_err(PipelineError::from)
            })
            .await?;

        let Some(processor) = self.processors.find(&file.path) else {
            tracing::debug!(path = %file.path.display(), "No processor accepts file");
            return Ok(FileOutcome::Skipped);
        };

        let metadata = limit
            .run(async {
                let local = Metadata::from_filename(&file.path);
                let merged = self.integrations.lookup(&file.path, file.kind, local).await;
                Ok::<_, PipelineError>(merged)
            })
            .await?;

        let extension = processor.output_extension().to_string();
        let output = resolve_output_path(&self.config, file, &metadata, &extension);

        let up_to_date = limit
            .run(async { Ok::<_, PipelineError>(self.is_up_to_date(&output).await) })
            .await?;
        if up_to_date {
            tracing::debug!(output = %output.display(), "Output up to date, skipping");
            return Ok(FileOutcome::Skipped);
        }

        let passthrough = is_same_format(&descriptor.format, &extension);
        let staged = staging.with_extension(&extension);

        if self.storage.is_dry_run() {
            if passthrough {
                self.storage.copy(&file.path, &output).await?;
            } else {
                self.storage.move_file(&staged, &output).await?;
            }
            tracing::info!(
                input = %file.path.display(),
                output = %output.display(),
                "[dry-run] Would process"
            );
            return Ok(FileOutcome::DryRun);
        }

        if passthrough {
            tracing::debug!(path = %file.path.display(), "Already in target format, copying");
            self.storage.copy(&file.path, &output).await?;
        } else {
            limit
                .run(async {
                    let converted = processor
                        .process_with_metadata(
                            limit.scope(),
                            &descriptor.path,
                            &staged,
                            &metadata,
                        )
                        .await;
                    converted.map_err(PipelineError::from)
                })
                .await?;
            self.storage.move_file(&staged, &output).await?;
        }

        let checksum = self.state.calculate_checksum(&output).await?;
        self.state
            .store_checksum(&output, &checksum, Some(&file.path))
            .await?;

        tracing::info!(
            input = %file.path.display(),
            output = %output.display(),
            processor = processor.name(),
            "Processed"
        );
        Ok(FileOutcome::Processed)
    }

    /// Whether `output` already holds the result of a previous run.
    async fn is_up_to_date(&self, output: &Path) -> bool {
        if !self.state.is_processed(output).await {
            return false;
        }
        // A rolled-back or deleted output keeps its record.
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return false;
        }
        if !self.config.verify_checksums {
            return true;
        }

        match self.state.verify_checksum(output).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(
                    output = %output.display(),
                    "Output changed since last run, reprocessing"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    output = %output.display(),
                    error = %e,
                    "Could not verify output, reprocessing"
                );
                false
            }
        }
    }
}

/// Deadline shared by the time-limited steps of one file.
struct TimeLimit<'a> {
    path: &'a Path,
    limit: Duration,
    deadline: tokio::time::Instant,
    scope: &'a CancellationToken,
}

impl<'a> TimeLimit<'a> {
    fn start(path: &'a Path, limit: Duration, scope: &'a CancellationToken) -> Self {
        Self {
            path,
            limit,
            deadline: tokio::time::Instant::now() + limit,
            scope,
        }
    }

    fn scope(&self) -> &CancellationToken {
        self.scope
    }

    /// Runs `step` until the deadline, cancelling the scope when it passes.
    async fn run<T, F>(&self, step: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        match tokio::time::timeout_at(self.deadline, step).await {
            Ok(result) => result,
            Err(_) => {
                self.scope.cancel();
                Err(PipelineError::ProcessingTimeout {
                    path: self.path.to_path_buf(),
                    timeout: self.limit,
                })
            }
        }
    }
}

/// Whether a detected input format already is the output format.
fn is_same_format(format: &str, extension: &str) -> bool {
    format == extension || matches!((format, extension), ("mp4", "m4a") | ("mp4", "m4v"))
}

/// Removes a staged file, and any extension variant of it.
async fn remove_staged(staged: &Path) {
    let mut dir = match staged.parent() {
        Some(parent) => match tokio::fs::read_dir(parent).await {
            Ok(dir) => dir,
            Err(_) => return,
        },
        None => return,
    };
    let Some(stem) = staged.file_stem().map(|s| s.to_os_string()) else {
        return;
    };

    while let Ok(Some(entry)) = dir.next_entry().await {
        let path: PathBuf = entry.path();
        if path.file_stem() == Some(stem.as_os_str()) {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{validator, write_file};
    use crate::testing::{MockProbe, MockProcessor, RecordingSink};
    use tempfile::TempDir;

    async fn pipeline(
        temp: &TempDir,
        config: PipelineConfig,
        processor: MockProcessor,
    ) -> Pipeline {
        let state = StateManager::new(temp.path().join("state")).await.unwrap();
        Pipeline::new(
            config,
            validator(MockProbe::new()),
            Arc::new(state),
            ProcessorRegistry::new().with(Arc::new(processor)),
        )
    }

    #[test]
    fn test_run_stats_split_processed_by_kind() {
        let stats = RunStats::default();
        stats.record(MediaKind::Audio, FileOutcome::Processed);
        stats.record(MediaKind::Video, FileOutcome::Processed);
        stats.record(MediaKind::Video, FileOutcome::Skipped);
        stats.record(MediaKind::Audio, FileOutcome::Failed);

        assert_eq!(stats.audio_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.video_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.skipped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_remove_staged_removes_extension_variants() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("abc");
        tokio::fs::write(temp.path().join("abc.flac"), "x").await.unwrap();
        tokio::fs::write(temp.path().join("keep.flac"), "x").await.unwrap();

        remove_staged(&staged.with_extension("flac")).await;

        assert!(!temp.path().join("abc.flac").exists());
        assert!(temp.path().join("keep.flac").exists());
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        tokio::fs::create_dir_all(&input).await.unwrap();
        let config = PipelineConfig::new(&input, temp.path().join("out"));

        let sink = Arc::new(RecordingSink::new());
        let p = pipeline(&temp, config, MockProcessor::new("p", ["mp3"], "flac"))
            .await
            .with_sink(sink.clone());

        let result = p.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.total, 0);
        assert!(result.is_success());
        assert!(temp.path().join("out/.refinery/staging").is_dir());
        assert_eq!(sink.events(), vec!["batch_completed".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_input_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::new(temp.path().join("missing"), temp.path().join("out"));
        let p = pipeline(&temp, config, MockProcessor::new("p", ["mp3"], "flac")).await;

        let err = p.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Scan { .. }));
    }

    #[tokio::test]
    async fn test_processed_file_gets_checksum_record() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        write_file(&input, "a.mp3", b"audio").await.unwrap();
        let config = PipelineConfig::new(&input, temp.path().join("out"));

        let processor = MockProcessor::new("p", ["mp3"], "flac");
        let expected = processor.expected_output(b"audio");
        let state = Arc::new(StateManager::new(temp.path().join("state")).await.unwrap());
        let p = Pipeline::new(
            config,
            validator(MockProbe::new()),
            Arc::clone(&state),
            ProcessorRegistry::new().with(Arc::new(processor)),
        );

        let result = p.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.audio_processed, 1);

        let output = temp.path().join("out/music/a.flac");
        assert_eq!(tokio::fs::read(&output).await.unwrap(), expected);
        let record = state.get_record(&output).await.unwrap();
        assert_eq!(record.input_path, Some(input.join("a.mp3")));
        assert!(state.verify_checksum(&output).await.unwrap());
    }

    #[tokio::test]
    async fn test_unaccepted_extension_is_skipped() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        write_file(&input, "film.mkv", b"video").await.unwrap();
        let config = PipelineConfig::new(&input, temp.path().join("out"));

        let p = pipeline(&temp, config, MockProcessor::new("p", ["mp3"], "flac")).await;
        let result = p.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.successful, 1);
        assert!(!temp.path().join("out/movies").exists());
    }

    #[test]
    fn test_same_format_aliases() {
        assert!(is_same_format("flac", "flac"));
        assert!(is_same_format("mp4", "m4a"));
        assert!(!is_same_format("mp3", "flac"));
        assert!(!is_same_format("m4a", "mp4"));
    }

    #[tokio::test]
    async fn test_misnamed_file_is_converted() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        // MP3 content behind a FLAC name.
        write_file(&input, "a.flac", b"ID3\x04\0\0rest").await.unwrap();
        let config = PipelineConfig::new(&input, temp.path().join("out"));

        let processor = Arc::new(MockProcessor::new("p", ["flac"], "flac"));
        let state = StateManager::new(temp.path().join("state")).await.unwrap();
        let p = Pipeline::new(
            config,
            validator(MockProbe::new()),
            Arc::new(state),
            ProcessorRegistry::new().with(processor.clone()),
        );

        let result = p.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(result.audio_processed, 1);
        assert_eq!(processor.call_count(), 1);
    }
}
