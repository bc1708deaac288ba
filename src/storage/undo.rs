//! Pre-image ring for single-step UNDO.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Ring capacity across all files.
pub const UNDO_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
#[allow(dead_code)]
struct UndoEntry {
    filename: String,
    content: String,
    timestamp: u64,
}

/// Bounded ring of pre-write file contents, newest last. Restoring does not
/// consume entries, so repeated UNDO of an unchanged file yields the same
/// pre-image again.
pub struct UndoRing {
    entries: Mutex<VecDeque<UndoEntry>>,
}

impl UndoRing {
    pub fn new() -> Self {
        Self { entries: Mutex::new(VecDeque::new()) }
    }

    /// Records the pre-image of `filename` before a mutation.
    pub fn push(&self, filename: &str, content: String, timestamp: u64) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == UNDO_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(UndoEntry {
            filename: filename.to_owned(),
            content,
            timestamp,
        });
    }

    /// Most recent pre-image recorded for `filename`, if any.
    pub fn latest_for(&self, filename: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .rev()
            .find(|e| e.filename == filename)
            .map(|e| e.content.clone())
    }

}

impl Default for UndoRing {
    fn default() -> Self {
        Self::new()
    }
}
