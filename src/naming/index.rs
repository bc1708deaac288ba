//! File-to-storage-server resolution: LRU cache, trie, linear fallback.
//!
//! Resolution order is fixed: the LRU answers without touching the trie, a
//! trie hit is promoted into the LRU, and only a miss in both falls back to
//! the authoritative linear scan of per-server file lists, which then feeds
//! both structures. Each structure has its own lock and the locks are taken
//! one at a time, never nested and never across I/O.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use super::registry::{Registry, SsId};
use super::trie::NameTrie;

/// Capacity of the filename lookup cache.
pub const CACHE_CAPACITY: usize = 100;

pub struct FileIndex {
    cache: Mutex<LruCache<String, SsId>>,
    trie: Mutex<NameTrie>,
}

impl FileIndex {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap();
        Self { cache: Mutex::new(LruCache::new(capacity)), trie: Mutex::new(NameTrie::new()) }
    }

    /// Resolves `name` to its hosting storage server.
    pub fn resolve(&self, name: &str, registry: &Registry) -> Option<SsId> {
        if let Some(&id) = self.cache.lock().unwrap().get(name) {
            return Some(id);
        }

        if let Some(id) = self.trie.lock().unwrap().lookup(name) {
            self.cache.lock().unwrap().put(name.to_owned(), id);
            return Some(id);
        }

        let id = registry.scan_for(name)?;
        self.trie.lock().unwrap().insert(name, id);
        self.cache.lock().unwrap().put(name.to_owned(), id);
        Some(id)
    }

    /// Records a freshly created or registered filename in the trie.
    ///
    /// The cache is left alone; it fills on the first [`FileIndex::resolve`].
    pub fn insert(&self, name: &str, id: SsId) {
        self.trie.lock().unwrap().insert(name, id);
    }

    #[cfg(test)]
    fn cached(&self, name: &str) -> Option<SsId> {
        self.cache.lock().unwrap().peek(name).copied()
    }

    #[cfg(test)]
    fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(files: &[&str]) -> (Registry, SsId) {
        let reg = Registry::new();
        let id = reg.register_ss(
            "127.0.0.1".into(),
            9100,
            9101,
            files.iter().map(|f| f.to_string()).collect(),
        );
        (reg, id)
    }

    #[test]
    fn test_linear_fallback_feeds_both_structures() {
        let (reg, id) = registry_with(&["a.txt"]);
        let index = FileIndex::new();

        assert_eq!(index.cached("a.txt"), None);
        assert_eq!(index.resolve("a.txt", &reg), Some(id));
        assert_eq!(index.cached("a.txt"), Some(id));

        // a second resolve is served by the cache even after the
        // authoritative list changes
        reg.remove_file(id, "a.txt");
        assert_eq!(index.resolve("a.txt", &reg), Some(id));
    }

    #[test]
    fn test_trie_hit_promotes_into_cache() {
        let (reg, id) = registry_with(&[]);
        let index = FileIndex::new();
        index.insert("b.txt", id);

        assert_eq!(index.cached("b.txt"), None);
        assert_eq!(index.resolve("b.txt", &reg), Some(id));
        assert_eq!(index.cached("b.txt"), Some(id));
    }

    #[test]
    fn test_miss_everywhere() {
        let (reg, _) = registry_with(&[]);
        let index = FileIndex::new();
        assert_eq!(index.resolve("nope.txt", &reg), None);
        assert_eq!(index.cache_len(), 0);
    }

    #[test]
    fn test_lru_keeps_last_hundred() {
        let (reg, id) = registry_with(&[]);
        let index = FileIndex::new();

        for i in 0..=CACHE_CAPACITY {
            let name = format!("f{i}.txt");
            index.insert(&name, id);
            assert_eq!(index.resolve(&name, &reg), Some(id));
        }

        assert_eq!(index.cache_len(), CACHE_CAPACITY);
        // the first entry was the least recently used and fell out
        assert_eq!(index.cached("f0.txt"), None);
        assert_eq!(index.cached("f1.txt"), Some(id));
    }

    #[test]
    fn test_lru_read_refreshes_recency() {
        let (reg, id) = registry_with(&[]);
        let index = FileIndex::new();

        for i in 0..CACHE_CAPACITY {
            let name = format!("f{i}.txt");
            index.insert(&name, id);
            index.resolve(&name, &reg);
        }

        // touch the oldest entry, then overflow by one
        assert_eq!(index.resolve("f0.txt", &reg), Some(id));
        index.insert("extra.txt", id);
        index.resolve("extra.txt", &reg);

        assert_eq!(index.cached("f0.txt"), Some(id));
        assert_eq!(index.cached("f1.txt"), None);
    }
}
