//! Whole-file exclusive write locks.
//!
//! Lock entries are created lazily on the first write attempt and never
//! destroyed. The table itself is a concurrent map (find-or-create), the
//! per-entry flag is flipped atomically. Acquisition hands out an RAII
//! guard; dropping the guard releases the lock, so a writer that vanishes
//! between the two protocol phases cannot leave the file locked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

struct FileLock {
    held: AtomicBool,
}

pub struct LockTable {
    locks: DashMap<String, Arc<FileLock>>,
}

/// Exclusive hold on one file, released on drop.
pub struct WriteGuard {
    lock: Arc<FileLock>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

impl LockTable {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    /// Attempts to take the file's exclusive lock. `None` means another
    /// writer holds it; there is no queueing.
    pub fn try_acquire(&self, filename: &str) -> Option<WriteGuard> {
        let lock = self
            .locks
            .entry(filename.to_owned())
            .or_insert_with(|| Arc::new(FileLock { held: AtomicBool::new(false) }))
            .clone();
        if lock.held.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(WriteGuard { lock })
    }

    /// True while a writer holds the file. Readers and streamers use this
    /// to reject with SENTENCE_LOCKED.
    pub fn is_locked(&self, filename: &str) -> bool {
        self.locks
            .get(filename)
            .map(|l| l.held.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}
