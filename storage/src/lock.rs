use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::FileId;

/// File ids currently being renamed on this node.
#[derive(Debug, Clone, Default)]
pub struct LockSet {
    inner: Arc<Mutex<HashSet<FileId>>>,
}

/// Membership in the [`LockSet`]; released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    id: FileId,
    inner: Arc<Mutex<HashSet<FileId>>>,
}

impl LockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquisition. `None` if another task holds `id`.
    pub fn try_acquire(&self, id: FileId) -> Option<LockGuard> {
        let mut held = lock(&self.inner);
        if !held.insert(id) {
            return None;
        }
        Some(LockGuard {
            id,
            inner: self.inner.clone(),
        })
    }

    pub fn contains(&self, id: FileId) -> bool {
        lock(&self.inner).contains(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockGuard {
    pub fn id(&self) -> FileId {
        self.id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        lock(&self.inner).remove(&self.id);
        tracing::debug!(file_id = self.id, "Released file lock");
    }
}

// The set holds no invariant a panicking holder could break.
fn lock(inner: &Mutex<HashSet<FileId>>) -> MutexGuard<'_, HashSet<FileId>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
