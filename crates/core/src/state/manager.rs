//! Write-through checksum state manager.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::error::StateError;
use super::types::ChecksumRecord;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

type KeyLocks = SyncMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Streams a file through SHA-256 and returns the lowercase hex digest.
pub async fn calculate_checksum(path: &Path) -> Result<String, StateError> {
    let io_err = |e| StateError::ChecksumIo {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Stores and answers "was this output already produced?".
///
/// The cache lock is only held for map access. Disk I/O for one key is
/// serialised by that key's own lock, so two workers storing different
/// outputs never wait on each other's writes.
pub struct StateManager {
    state_dir: PathBuf,
    cache: RwLock<HashMap<PathBuf, ChecksumRecord>>,
    key_locks: KeyLocks,
}

impl StateManager {
    /// Opens (creating if needed) a state directory.
    pub async fn new(state_dir: impl Into<PathBuf>) -> Result<Self, StateError> {
        let state_dir = state_dir.into();
        fs::create_dir_all(&state_dir)
            .await
            .map_err(|e| StateError::Persist {
                record: state_dir.clone(),
                source: e,
            })?;

        Ok(Self {
            state_dir,
            cache: RwLock::new(HashMap::new()),
            key_locks: SyncMutex::new(HashMap::new()),
        })
    }

    /// Returns the state directory.
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Computes the SHA-256 of a file's content.
    pub async fn calculate_checksum(&self, path: &Path) -> Result<String, StateError> {
        calculate_checksum(path).await
    }

    /// Records that `output_path` now has content `checksum`.
    ///
    /// Once this returns `Ok`, the cache and the on-disk record agree.
    pub async fn store_checksum(
        &self,
        output_path: &Path,
        checksum: &str,
        input_path: Option<&Path>,
    ) -> Result<(), StateError> {
        let record = ChecksumRecord {
            processed_at: chrono::Utc::now().timestamp(),
            checksum: checksum.to_string(),
            output_path: output_path.to_path_buf(),
            input_path: input_path.map(Path::to_path_buf),
        };

        let (key, _guard) = self.lock_key(output_path).await;
        let record_path = self.record_path(&key);

        let json = serde_json::to_vec_pretty(&record).map_err(|e| StateError::Corrupt {
            record: record_path.clone(),
            source: e,
        })?;
        Self::write_atomic(&record_path, &json).await?;

        self.cache
            .write()
            .await
            .insert(output_path.to_path_buf(), record);

        tracing::debug!(
            output = %output_path.display(),
            checksum = %checksum,
            "Stored checksum record"
        );
        Ok(())
    }

    /// Returns the full record for `output_path`.
    pub async fn get_record(&self, output_path: &Path) -> Result<ChecksumRecord, StateError> {
        if let Some(record) = self.cache.read().await.get(output_path) {
            return Ok(record.clone());
        }

        let (key, _guard) = self.lock_key(output_path).await;

        // Another worker may have stored it while we waited for the key.
        if let Some(record) = self.cache.read().await.get(output_path) {
            return Ok(record.clone());
        }

        let record_path = self.record_path(&key);
        let bytes = match fs::read(&record_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::NotProcessed {
                    path: output_path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(StateError::Persist {
                    record: record_path,
                    source: e,
                });
            }
        };

        let record: ChecksumRecord =
            serde_json::from_slice(&bytes).map_err(|e| StateError::Corrupt {
                record: record_path,
                source: e,
            })?;

        self.cache
            .write()
            .await
            .insert(output_path.to_path_buf(), record.clone());
        Ok(record)
    }

    /// Returns the stored checksum for `output_path`.
    pub async fn get_checksum(&self, output_path: &Path) -> Result<String, StateError> {
        self.get_record(output_path).await.map(|r| r.checksum)
    }

    /// Whether the file at `output_path` still matches its stored checksum.
    pub async fn verify_checksum(&self, output_path: &Path) -> Result<bool, StateError> {
        let stored = self.get_checksum(output_path).await?;
        let current = calculate_checksum(output_path).await?;
        Ok(stored == current)
    }

    /// Whether any record exists for `output_path`. Does not re-hash.
    pub async fn is_processed(&self, output_path: &Path) -> bool {
        match self.get_record(output_path).await {
            Ok(_) => true,
            Err(StateError::NotProcessed { .. }) => false,
            Err(e) => {
                tracing::warn!(
                    output = %output_path.display(),
                    error = %e,
                    "Unreadable state record, treating as unprocessed"
                );
                false
            }
        }
    }

    /// Removes the record for `output_path` from cache and disk.
    ///
    /// Returns whether a record existed on disk.
    pub async fn purge(&self, output_path: &Path) -> Result<bool, StateError> {
        let (key, _guard) = self.lock_key(output_path).await;
        let record_path = self.record_path(&key);

        let existed = match fs::remove_file(&record_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(StateError::Persist {
                    record: record_path,
                    source: e,
                });
            }
        };

        self.cache.write().await.remove(output_path);
        Ok(existed)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.state_dir.join(format!("{}.json", key))
    }

    /// Hashes the output path into its record key and locks that key.
    async fn lock_key(&self, output_path: &Path) -> (String, KeyGuard<'_>) {
        let key = format!("{:x}", Sha256::digest(output_path.to_string_lossy().as_bytes()));
        let lock = {
            let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = KeyGuard {
            locks: &self.key_locks,
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
        };
        (key, guard)
    }

    async fn write_atomic(record_path: &Path, bytes: &[u8]) -> Result<(), StateError> {
        let tmp = record_path.with_extension("json.tmp");
        let persist = |e| StateError::Persist {
            record: record_path.to_path_buf(),
            source: e,
        };

        let mut file = File::create(&tmp).await.map_err(persist)?;
        file.write_all(bytes).await.map_err(persist)?;
        file.sync_all().await.map_err(persist)?;
        drop(file);

        fs::rename(&tmp, record_path).await.map_err(persist)
    }
}

/// Holds one key's lock and drops the key's entry once nobody waits on it.
struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
