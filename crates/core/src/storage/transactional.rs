//! Journaled file system storage.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::config::StorageConfig;
use super::error::StorageError;
use super::types::{Operation, OperationKind};

/// File system storage that journals every mutation.
///
/// One mutex guards both the mutations and the log, so the log order is the
/// order in which mutations actually happened. The log lives as long as the
/// instance; a new run gets a new instance.
pub struct TransactionalStorage {
    config: StorageConfig,
    dry_run: bool,
    operations: Mutex<Vec<Operation>>,
}

impl TransactionalStorage {
    /// Creates a new storage with the given configuration.
    pub fn new(config: StorageConfig, dry_run: bool) -> Self {
        Self {
            config,
            dry_run,
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Creates a live storage with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StorageConfig::default(), false)
    }

    /// Whether mutations are only recorded.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns a snapshot of the operation log.
    pub async fn operations(&self) -> Vec<Operation> {
        self.operations.lock().await.clone()
    }

    /// Copies `src` to `dest`, backing up any file already at `dest`.
    pub async fn copy(&self, src: &Path, dest: &Path) -> Result<(), StorageError> {
        let mut log = self.operations.lock().await;
        let op = journal(&mut log, Operation::new(OperationKind::Copy, Some(src), dest));

        if self.dry_run {
            tracing::debug!(op = %op, "[dry-run] recorded");
            return Ok(());
        }

        self.copy_live(src, dest, op).await
    }

    /// Moves `src` to `dest`, renaming when possible.
    ///
    /// An existing file at `dest` is backed up first, as with [`copy`](Self::copy).
    pub async fn move_file(&self, src: &Path, dest: &Path) -> Result<(), StorageError> {
        let mut log = self.operations.lock().await;
        let op = journal(&mut log, Operation::new(OperationKind::Move, Some(src), dest));

        if self.dry_run {
            tracing::debug!(op = %op, "[dry-run] recorded");
            return Ok(());
        }

        self.move_live(src, dest, op).await
    }

    /// Creates `path` and any missing parents.
    pub async fn create_dir(&self, path: &Path) -> Result<(), StorageError> {
        let mut log = self.operations.lock().await;
        let op = journal(&mut log, Operation::new(OperationKind::CreateDir, None, path));

        if self.dry_run {
            tracing::debug!(op = %op, "[dry-run] recorded");
            return Ok(());
        }

        match Self::create_dirs(path, &mut op.created_dirs).await {
            Ok(()) => {
                op.completed = true;
                Ok(())
            }
            Err(e) => {
                self.abandon(path, op).await;
                Err(e)
            }
        }
    }

    /// Reverses every operation that changed the disk, newest first.
    ///
    /// Completed operations are reversed, and so are operations that were
    /// interrupted partway. All operations are attempted even when some
    /// fail; failures are logged and reported as a count. Returns the number
    /// of operations reverted.
    pub async fn rollback(&self) -> Result<usize, StorageError> {
        let mut log = self.operations.lock().await;
        let mut reverted = 0;
        let mut attempted = 0;
        let mut failures = 0;

        for op in log.iter_mut().rev() {
            if !op.completed && !op.is_partial() {
                continue;
            }
            attempted += 1;

            let errors = self.undo(op).await;
            if errors.is_empty() {
                reverted += 1;
                op.mark_reverted();
            } else {
                for e in &errors {
                    tracing::warn!(op = %op, error = %e, "Rollback step failed");
                }
                failures += errors.len();
            }
        }

        if failures > 0 {
            return Err(StorageError::RollbackFailed {
                failures,
                attempted,
            });
        }

        tracing::info!(reverted, "Rollback completed");
        Ok(reverted)
    }

    async fn copy_live(
        &self,
        src: &Path,
        dest: &Path,
        op: &mut Operation,
    ) -> Result<(), StorageError> {
        let src_meta = fs::metadata(src).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceNotFound {
                    path: src.to_path_buf(),
                }
            } else {
                StorageError::Io(e)
            }
        })?;

        let copied = async {
            if let Some(parent) = dest.parent() {
                Self::create_dirs(parent, &mut op.created_dirs).await?;
            }
            self.backup_existing(dest, op).await?;

            op.destination_written = true;
            self.copy_file(src, dest).await?;
            fs::set_permissions(dest, src_meta.permissions())
                .await
                .map_err(|e| {
                    StorageError::copy_failed(src.to_path_buf(), dest.to_path_buf(), e)
                })
        }
        .await;

        match copied {
            Ok(()) => {
                op.completed = true;
                Ok(())
            }
            Err(e) => {
                self.abandon(dest, op).await;
                Err(e)
            }
        }
    }

    async fn move_live(
        &self,
        src: &Path,
        dest: &Path,
        op: &mut Operation,
    ) -> Result<(), StorageError> {
        if !fs::try_exists(src).await? {
            return Err(StorageError::SourceNotFound {
                path: src.to_path_buf(),
            });
        }

        let moved = async {
            if let Some(parent) = dest.parent() {
                Self::create_dirs(parent, &mut op.created_dirs).await?;
            }
            self.backup_existing(dest, op).await?;

            op.destination_written = true;
            self.rename_or_copy(src, dest).await
        }
        .await;

        match moved {
            Ok(()) => {
                op.completed = true;
                Ok(())
            }
            Err(e) => {
                self.abandon(dest, op).await;
                Err(e)
            }
        }
    }

    /// Reverts what a failed mutation already did, so the operation stays
    /// in the log with nothing left to roll back.
    async fn abandon(&self, dest: &Path, op: &mut Operation) {
        if op.destination_written && op.kind != OperationKind::CreateDir {
            if let Err(e) = fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %dest.display(),
                        error = %e,
                        "Failed to remove partial file"
                    );
                }
            }
        }
        op.destination_written = false;

        self.restore_backup(dest, op).await;

        let mut errors = Vec::new();
        Self::remove_created_dirs(&op.created_dirs, &mut errors).await;
        if errors.is_empty() {
            op.created_dirs.clear();
        }
        for e in &errors {
            tracing::warn!(op = %op, error = %e, "Failed to remove created directory");
        }
    }

    /// Renames `src` to `dest`, or copies and deletes when renaming fails.
    async fn rename_or_copy(&self, src: &Path, dest: &Path) -> Result<(), StorageError> {
        let Err(rename_err) = fs::rename(src, dest).await else {
            return Ok(());
        };

        tracing::debug!(
            from = %src.display(),
            to = %dest.display(),
            error = %rename_err,
            "Rename failed, falling back to copy"
        );

        if let Err(e) = self.copy_file(src, dest).await {
            let _ = fs::remove_file(dest).await;
            tracing::debug!(error = %e, "Copy fallback failed");
            return Err(StorageError::move_failed(
                src.to_path_buf(),
                dest.to_path_buf(),
                rename_err,
            ));
        }
        if let Err(e) = fs::remove_file(src).await {
            let _ = fs::remove_file(dest).await;
            return Err(StorageError::CleanupFailed {
                path: src.to_path_buf(),
                source: e,
            });
        }
        Ok(())
    }

    /// Moves an existing file at `dest` aside and records where it went.
    async fn backup_existing(
        &self,
        dest: &Path,
        op: &mut Operation,
    ) -> Result<(), StorageError> {
        if !fs::try_exists(dest).await? {
            return Ok(());
        }

        let backup = self.backup_path_for(dest);
        if let Some(dir) = &self.config.backup_dir {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::DirectoryCreationFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }

        // Recorded first, so an interrupted backup can still be found.
        op.backup_path = Some(backup.clone());
        if let Err(e) = Self::relocate(dest, &backup, self.config.buffer_size).await {
            let _ = fs::remove_file(&backup).await;
            op.backup_path = None;
            return Err(StorageError::BackupFailed {
                path: dest.to_path_buf(),
                source: e,
            });
        }

        tracing::debug!(
            path = %dest.display(),
            backup = %backup.display(),
            "Backed up existing destination"
        );
        Ok(())
    }

    /// Puts a backup taken by this operation back after a failed mutation.
    async fn restore_backup(&self, dest: &Path, op: &mut Operation) {
        let Some(backup) = op.backup_path.take() else {
            return;
        };
        if let Err(e) = Self::relocate(&backup, dest, self.config.buffer_size).await {
            tracing::error!(
                path = %dest.display(),
                backup = %backup.display(),
                error = %e,
                "Failed to restore backup after failed mutation"
            );
            op.backup_path = Some(backup);
        }
    }

    /// Copies file contents and syncs them to disk.
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64, StorageError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            }
        })?;

        let dest_file = File::create(destination).await.map_err(|e| {
            StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let fail =
            |e| StorageError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e);

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(fail)?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read]).await.map_err(fail)?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(fail)?;
        if self.config.sync_writes {
            writer.into_inner().sync_all().await.map_err(fail)?;
        }

        Ok(total_bytes)
    }

    /// Moves a file without journaling, falling back to copy and delete.
    async fn relocate(from: &Path, to: &Path, buffer_size: usize) -> Result<(), std::io::Error> {
        if fs::rename(from, to).await.is_ok() {
            return Ok(());
        }

        let mut reader = BufReader::with_capacity(buffer_size, File::open(from).await?);
        let mut writer = BufWriter::with_capacity(buffer_size, File::create(to).await?);
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        fs::remove_file(from).await
    }

    /// Creates `dir` and records which directories did not exist before.
    async fn create_dirs(dir: &Path, created: &mut Vec<PathBuf>) -> Result<(), StorageError> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if fs::try_exists(path).await.unwrap_or(false) {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }

        if missing.is_empty() {
            return Ok(());
        }

        // Recorded before creation, so an interrupted call is still undone.
        created.extend(missing.into_iter().rev());
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
    }

    fn backup_path_for(&self, dest: &Path) -> PathBuf {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let backup_name = format!(".{}.{}.bak", name, Uuid::new_v4());

        match &self.config.backup_dir {
            Some(dir) => dir.join(backup_name),
            None => dest.with_file_name(backup_name),
        }
    }

    /// Reverses one operation, returning every error encountered.
    async fn undo(&self, op: &Operation) -> Vec<std::io::Error> {
        let buffer_size = self.config.buffer_size;
        let mut errors = Vec::new();
        let written = op.completed || op.destination_written;

        match op.kind {
            OperationKind::Copy => {
                if written {
                    remove_if_present(&op.destination, &mut errors).await;
                }
                self.undo_backup(op, written, &mut errors).await;
            }
            OperationKind::Move => {
                if let Some(source) = op.source.as_ref().filter(|_| written) {
                    // An interrupted move that still has its source only
                    // left a copy behind.
                    let source_kept =
                        !op.completed && fs::try_exists(source).await.unwrap_or(false);
                    if source_kept {
                        remove_if_present(&op.destination, &mut errors).await;
                    } else if let Err(e) =
                        Self::relocate(&op.destination, source, buffer_size).await
                    {
                        errors.push(e);
                    }
                }
                if errors.is_empty() {
                    self.undo_backup(op, written, &mut errors).await;
                }
            }
            OperationKind::CreateDir => {}
        }

        if errors.is_empty() {
            Self::remove_created_dirs(&op.created_dirs, &mut errors).await;
        }

        errors
    }

    /// Puts the backup of an overwritten destination back in place.
    async fn undo_backup(
        &self,
        op: &Operation,
        written: bool,
        errors: &mut Vec<std::io::Error>,
    ) {
        let Some(backup) = &op.backup_path else {
            return;
        };
        if !written && fs::try_exists(&op.destination).await.unwrap_or(false) {
            // Interrupted before the destination was moved aside.
            remove_if_present(backup, errors).await;
            return;
        }
        let restored = Self::relocate(backup, &op.destination, self.config.buffer_size).await;
        if let Err(e) = restored {
            errors.push(e);
        }
    }

    /// Removes created directories child first, leaving non-empty ones alone.
    async fn remove_created_dirs(dirs: &[PathBuf], errors: &mut Vec<std::io::Error>) {
        for dir in dirs.iter().rev() {
            let mut entries = match fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            match entries.next_entry().await {
                Ok(None) => {
                    if let Err(e) = fs::remove_dir(dir).await {
                        errors.push(e);
                    }
                }
                Ok(Some(_)) => {}
                Err(e) => errors.push(e),
            }
        }
    }
}

/// Appends `op` to the log and returns it for in-place updates.
fn journal(log: &mut Vec<Operation>, op: Operation) -> &mut Operation {
    log.push(op);
    let last = log.len() - 1;
    &mut log[last]
}

async fn remove_if_present(path: &Path, errors: &mut Vec<std::io::Error>) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            errors.push(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_creates_parents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.flac");
        let dest = temp.path().join("out/music/a.flac");
        fs::write(&src, "audio").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.copy(&src, &dest).await.unwrap();

        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "audio");
        assert!(src.exists());

        let ops = storage.operations().await;
        assert_eq!(ops.len(), 1);
        assert!(ops[0].completed);
        assert_eq!(ops[0].created_dirs.len(), 2);
        assert!(ops[0].backup_path.is_none());
    }

    #[tokio::test]
    async fn test_copy_backs_up_existing_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("new.flac");
        let dest = temp.path().join("out.flac");
        fs::write(&src, "new").await.unwrap();
        fs::write(&dest, "old").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.copy(&src, &dest).await.unwrap();

        let ops = storage.operations().await;
        let backup = ops[0].backup_path.clone().unwrap();
        assert_eq!(fs::read_to_string(&backup).await.unwrap(), "old");
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let temp = TempDir::new().unwrap();
        let storage = TransactionalStorage::with_defaults();

        let result = storage
            .copy(&temp.path().join("missing"), &temp.path().join("dest"))
            .await;

        assert!(matches!(result, Err(StorageError::SourceNotFound { .. })));
        let ops = storage.operations().await;
        assert_eq!(ops.len(), 1);
        assert!(!ops[0].completed);
    }

    #[tokio::test]
    async fn test_move_renames_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staged.flac");
        let dest = temp.path().join("out/a.flac");
        fs::write(&src, "data").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.move_file(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "data");
    }

    #[tokio::test]
    async fn test_dry_run_records_without_touching_disk() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.mp3");
        fs::write(&src, "data").await.unwrap();

        let storage = TransactionalStorage::new(StorageConfig::default(), true);
        assert!(storage.is_dry_run());

        storage.create_dir(&temp.path().join("out")).await.unwrap();
        storage
            .copy(&src, &temp.path().join("out/a.mp3"))
            .await
            .unwrap();
        storage
            .move_file(&src, &temp.path().join("out/b.mp3"))
            .await
            .unwrap();

        assert!(!temp.path().join("out").exists());
        assert!(src.exists());

        let ops = storage.operations().await;
        let kinds: Vec<_> = ops.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::CreateDir, OperationKind::Copy, OperationKind::Move]
        );
        assert!(ops.iter().all(|o| !o.completed));
    }

    #[tokio::test]
    async fn test_rollback_restores_backup_and_removes_dirs() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.flac");
        let existing = temp.path().join("existing.flac");
        let fresh = temp.path().join("new/dir/fresh.flac");
        fs::write(&src, "replacement").await.unwrap();
        fs::write(&existing, "original").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.copy(&src, &existing).await.unwrap();
        storage.copy(&src, &fresh).await.unwrap();

        let reverted = storage.rollback().await.unwrap();
        assert_eq!(reverted, 2);

        assert_eq!(fs::read_to_string(&existing).await.unwrap(), "original");
        assert!(!fresh.exists());
        assert!(!temp.path().join("new").exists());

        // Second rollback has nothing left to do.
        assert_eq!(storage.rollback().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rollback_moves_file_back() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("staged.flac");
        let dest = temp.path().join("out/a.flac");
        fs::write(&src, "data").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.move_file(&src, &dest).await.unwrap();
        storage.rollback().await.unwrap();

        assert_eq!(fs::read_to_string(&src).await.unwrap(), "data");
        assert!(!dest.exists());
        assert!(!temp.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_rollback_keeps_non_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("made");

        let storage = TransactionalStorage::with_defaults();
        storage.create_dir(&dir).await.unwrap();
        fs::write(dir.join("foreign.txt"), "x").await.unwrap();

        storage.rollback().await.unwrap();
        assert!(dir.join("foreign.txt").exists());
    }

    #[tokio::test]
    async fn test_move_over_existing_is_reversible() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.flac");
        let dest = temp.path().join("a.flac");
        fs::write(&staged, "new").await.unwrap();
        fs::write(&dest, "old").await.unwrap();

        let storage = TransactionalStorage::with_defaults();
        storage.move_file(&staged, &dest).await.unwrap();
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "new");
        assert!(storage.operations().await[0].backup_path.is_some());

        storage.rollback().await.unwrap();
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "old");
        assert_eq!(fs::read_to_string(&staged).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_backup_dir_is_used() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src.flac");
        let dest = temp.path().join("dest.flac");
        let backups = temp.path().join("backups");
        fs::write(&src, "new").await.unwrap();
        fs::write(&dest, "old").await.unwrap();

        let storage = TransactionalStorage::new(
            StorageConfig::default().with_backup_dir(backups.clone()),
            false,
        );
        storage.copy(&src, &dest).await.unwrap();

        let backup = storage.operations().await[0].backup_path.clone().unwrap();
        assert!(backup.starts_with(&backups));
    }
}
