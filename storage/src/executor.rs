use bytes::Bytes;
use consensus::{FileRef, Operation};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::lock::{LockGuard, LockSet};
use crate::record::{validate_name, FileId, FileRecord};
use crate::{Result, StorageError};

/// What a successful apply changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Uploaded(FileRecord),
    Deleted(FileRecord),
    Renamed { id: FileId, from: String, to: String },
}

/// Applies mutations to one node's directory and its id → name mapping.
pub struct FileExecutor {
    directory: PathBuf,
    files: RwLock<BTreeMap<FileId, String>>,
    next_id: AtomicU64,
    locks: LockSet,
}

impl FileExecutor {
    /// Wipes and recreates `directory`. Nothing survives a restart.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();

        match fs::remove_dir_all(&directory).await {
            Ok(()) => tracing::debug!("Cleared previous contents of {:?}", directory),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }
        fs::create_dir_all(&directory).await?;

        tracing::info!("File store ready at {:?}", directory);

        Ok(Self {
            directory,
            files: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            locks: LockSet::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn locks(&self) -> &LockSet {
        &self.locks
    }

    pub async fn apply(&self, operation: &Operation) -> Result<ApplyOutcome> {
        match operation {
            Operation::Upload { name, data } => {
                self.upload(name, data).await.map(ApplyOutcome::Uploaded)
            }
            Operation::Delete { target } => self.delete(target).await.map(ApplyOutcome::Deleted),
            Operation::Rename {
                target,
                new_name,
                hold_duration_ms,
            } => {
                let hold = Duration::from_millis(*hold_duration_ms);
                let renamed = self.rename(target, new_name, hold).await?;
                Ok(ApplyOutcome::Renamed {
                    id: renamed.id,
                    from: target.name.clone(),
                    to: renamed.name,
                })
            }
        }
    }

    pub async fn upload(&self, name: &str, data: &[u8]) -> Result<FileRecord> {
        validate_name(name)?;
        let path = self.directory.join(name);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::DuplicateFile(name.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        if let Err(e) = Self::write_all(&mut file, data).await {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::error!("Failed to remove partial upload {:?}: {}", path, cleanup);
            }
            return Err(StorageError::Io(e));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.files.write().await.insert(id, name.to_string());

        tracing::info!(
            file_id = id,
            size = data.len(),
            digest = %content_digest(data),
            "Stored file {}",
            name
        );

        Ok(FileRecord::new(id, name))
    }

    async fn write_all(file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await
    }

    pub async fn delete(&self, target: &FileRef) -> Result<FileRecord> {
        let id = self.resolve(target).await?;

        // Claiming the id makes the lock check and the removal one step
        // relative to a concurrent rename.
        let _guard = self
            .locks
            .try_acquire(id)
            .ok_or(StorageError::FileLocked(id))?;

        let name = self
            .name_of(id)
            .await
            .ok_or_else(|| StorageError::NotFound(format!("file id {}", id)))?;

        fs::remove_file(self.directory.join(&name)).await?;
        self.files.write().await.remove(&id);

        tracing::info!(file_id = id, "Deleted file {}", name);
        Ok(FileRecord::new(id, name))
    }

    /// Non-blocking claim on a file id, the same lock a rename holds.
    pub fn claim(&self, id: FileId) -> Result<LockGuard> {
        match self.locks.try_acquire(id) {
            Some(guard) => Ok(guard),
            None => {
                tracing::warn!(file_id = id, "File locked for renaming. Try again later.");
                Err(StorageError::FileLocked(id))
            }
        }
    }

    /// Holds the file's lock for `hold` before renaming, failing fast if the
    /// lock is taken.
    pub async fn rename(&self, target: &FileRef, new_name: &str, hold: Duration) -> Result<FileRecord> {
        validate_name(new_name)?;
        let id = self.resolve(target).await?;
        let claim = self.claim(id)?;
        self.rename_claimed(&claim, new_name, hold).await
    }

    /// Rename for a caller that already holds the file's claim.
    pub async fn rename_claimed(
        &self,
        claim: &LockGuard,
        new_name: &str,
        hold: Duration,
    ) -> Result<FileRecord> {
        validate_name(new_name)?;
        let id = claim.id();

        tracing::info!(file_id = id, hold_ms = hold.as_millis() as u64, "Renaming to {}", new_name);
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }

        let mut files = self.files.write().await;
        let current = files
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("file id {}", id)))?;

        if current != new_name {
            self.move_no_replace(&current, new_name).await?;
        }
        files.insert(id, new_name.to_string());

        tracing::info!(file_id = id, "Rename successful: {} -> {}", current, new_name);
        Ok(FileRecord::new(id, new_name))
    }

    /// Moves `from` to `to` unless `to` already exists. An upload creating `to`
    /// concurrently either wins, and the move fails, or loses its `create_new`.
    async fn move_no_replace(&self, from: &str, to: &str) -> Result<()> {
        let source = self.directory.join(from);
        let destination = self.directory.join(to);

        match fs::hard_link(&source, &destination).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::DuplicateFile(to.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        if let Err(e) = fs::remove_file(&source).await {
            if let Err(cleanup) = fs::remove_file(&destination).await {
                tracing::error!("Failed to undo link {:?}: {}", destination, cleanup);
            }
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    /// Finds the local id for a file named by any node. The id is trusted only
    /// if it still maps to the same name here.
    pub async fn resolve(&self, target: &FileRef) -> Result<FileId> {
        let files = self.files.read().await;

        if files.get(&target.id) == Some(&target.name) {
            return Ok(target.id);
        }

        files
            .iter()
            .find(|(_, name)| **name == target.name)
            .map(|(id, _)| *id)
            .ok_or_else(|| StorageError::NotFound(target.name.clone()))
    }

    pub async fn name_of(&self, id: FileId) -> Option<String> {
        self.files.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> BTreeMap<FileId, String> {
        self.files.read().await.clone()
    }

    pub async fn read(&self, id: FileId) -> Result<FileRecord> {
        self.name_of(id)
            .await
            .map(|name| FileRecord::new(id, name))
            .ok_or_else(|| StorageError::NotFound(format!("file id {}", id)))
    }

    pub async fn read_bytes(&self, id: FileId) -> Result<(FileRecord, Bytes)> {
        let record = self.read(id).await?;

        match fs::read(self.directory.join(&record.name)).await {
            Ok(data) => Ok((record, Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(record.name)),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Hex blake3 digest of file contents.
pub fn content_digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
