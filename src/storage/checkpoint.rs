//! Tagged per-file content snapshots.

use dashmap::DashMap;

use crate::proto::Status;

/// Maximum snapshots retained per file.
pub const MAX_CHECKPOINTS: usize = 50;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub tag: String,
    pub content: String,
    pub timestamp: u64,
    pub author: String,
}

/// Per-file bounded list of immutable snapshots. Tags are unique within a
/// file; reverting never removes a snapshot.
pub struct CheckpointStore {
    files: DashMap<String, Vec<Checkpoint>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self { files: DashMap::new() }
    }

    /// Appends a snapshot. Fails on a duplicate tag or a full list, with the
    /// message surfaced in-band.
    pub fn add(
        &self,
        filename: &str,
        tag: &str,
        content: String,
        author: &str,
        timestamp: u64,
    ) -> Result<(), (Status, String)> {
        let mut list = self.files.entry(filename.to_owned()).or_default();
        if list.iter().any(|c| c.tag == tag) {
            return Err((Status::FileExists, format!("checkpoint {tag:?} already exists")));
        }
        if list.len() >= MAX_CHECKPOINTS {
            return Err((
                Status::InvalidCommand,
                format!("checkpoint limit of {MAX_CHECKPOINTS} reached"),
            ));
        }
        list.push(Checkpoint {
            tag: tag.to_owned(),
            content,
            timestamp,
            author: author.to_owned(),
        });
        Ok(())
    }

    /// Snapshot content for `tag`, if present.
    pub fn view(&self, filename: &str, tag: &str) -> Option<String> {
        let list = self.files.get(filename)?;
        list.iter().find(|c| c.tag == tag).map(|c| c.content.clone())
    }

    /// Enumerates (tag, timestamp, author) triples in creation order.
    pub fn list(&self, filename: &str) -> Vec<(String, u64, String)> {
        self.files
            .get(filename)
            .map(|list| {
                list.iter()
                    .map(|c| (c.tag.clone(), c.timestamp, c.author.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn count(&self, filename: &str) -> usize {
        self.files.get(filename).map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_view() {
        let store = CheckpointStore::new();
        store.add("a.txt", "v1", "content".into(), "alice", 100).unwrap();
        assert_eq!(store.view("a.txt", "v1").as_deref(), Some("content"));
        assert_eq!(store.view("a.txt", "v2"), None);
        assert_eq!(store.view("b.txt", "v1"), None);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let store = CheckpointStore::new();
        store.add("a.txt", "v1", "one".into(), "alice", 100).unwrap();
        let err = store.add("a.txt", "v1", "two".into(), "alice", 101).unwrap_err();
        assert_eq!(err.0, Status::FileExists);
        // the original snapshot is untouched
        assert_eq!(store.view("a.txt", "v1").as_deref(), Some("one"));
    }

    #[test]
    fn test_same_tag_on_other_file_is_fine() {
        let store = CheckpointStore::new();
        store.add("a.txt", "v1", "a".into(), "alice", 1).unwrap();
        store.add("b.txt", "v1", "b".into(), "bob", 2).unwrap();
        assert_eq!(store.view("b.txt", "v1").as_deref(), Some("b"));
    }

    #[test]
    fn test_capacity_limit() {
        let store = CheckpointStore::new();
        for i in 0..MAX_CHECKPOINTS {
            store.add("a.txt", &format!("t{i}"), String::new(), "alice", i as u64).unwrap();
        }
        let err = store.add("a.txt", "overflow", String::new(), "alice", 99).unwrap_err();
        assert_eq!(err.0, Status::InvalidCommand);
        assert_eq!(store.count("a.txt"), MAX_CHECKPOINTS);
    }

    #[test]
    fn test_list_in_creation_order() {
        let store = CheckpointStore::new();
        store.add("a.txt", "first", String::new(), "alice", 10).unwrap();
        store.add("a.txt", "second", String::new(), "bob", 20).unwrap();
        let list = store.list("a.txt");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], ("first".into(), 10, "alice".into()));
        assert_eq!(list[1], ("second".into(), 20, "bob".into()));
    }
}
