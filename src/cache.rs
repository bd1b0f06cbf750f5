//! Fingerprint-keyed result cache shared across digest workers.
//!
//! Entries are keyed by the hex blake3 digest of file contents, so two
//! files with identical bytes share one entry regardless of path. An entry
//! exists only for documents that validated as well-formed JSON at the time
//! of caching; malformed files are never cached.
//!
//! Persistence is a collaborator concern behind [`CacheStore`]: the pipeline
//! only needs a load-once / save-once snapshot round trip. A missing or
//! corrupt snapshot degrades to an empty cache; a failed save is reported,
//! never fatal.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::matcher::TagCounts;

/// On-disk/in-memory form of the whole cache, keyed by hex fingerprint.
pub type Snapshot = HashMap<String, CacheEntry>;

/// Cached digestion result for one distinct file content.
///
/// `path` records the first file the content was seen under; it is
/// diagnostic only and does not participate in lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub fingerprint: String,
    pub tag_counts: TagCounts,
}

/// Concurrent fingerprint → entry map for one pipeline run.
///
/// A single mutex guards the whole map; cache operations are cheap relative
/// to file I/O and matching, so finer-grained locking buys nothing here.
/// The get-then-put race between two workers holding identical bytes is
/// benign: both write the same entry.
pub struct ContentCache {
    entries: Mutex<Snapshot>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::new())
    }

    /// Seeds the cache from a previously persisted snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entries: Mutex::new(snapshot),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        self.lock().get(fingerprint).cloned()
    }

    pub fn put(&self, entry: CacheEntry) {
        self.lock().insert(entry.fingerprint.clone(), entry);
    }

    /// Clones the current contents for persistence.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence seam for the cache snapshot.
///
/// Implementations own the on-disk encoding; the pipeline only requires
/// round-trip fidelity. Both operations are called at most once per run,
/// outside the concurrent section.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> io::Result<Snapshot>;
    fn save(&self, snapshot: &Snapshot) -> io::Result<()>;
}

/// Shipped store: one JSON object per snapshot, keyed by hex fingerprint.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheStore for JsonSnapshotStore {
    fn load(&self) -> io::Result<Snapshot> {
        let data = fs::read(&self.path)?;
        serde_json::from_slice(&data)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    fn save(&self, snapshot: &Snapshot) -> io::Result<()> {
        let data = serde_json::to_vec(snapshot)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(fingerprint: &str, path: &str, tag: &str, count: u64) -> CacheEntry {
        CacheEntry {
            path: PathBuf::from(path),
            fingerprint: fingerprint.to_string(),
            tag_counts: TagCounts::from([(tag.to_string(), count)]),
        }
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = ContentCache::new();
        assert!(cache.get("abc").is_none());
        cache.put(entry("abc", "/data/a.json", "foo", 3));
        let hit = cache.get("abc").expect("entry present");
        assert_eq!(hit.tag_counts.get("foo"), Some(&3));
    }

    #[test]
    fn identical_fingerprints_share_one_entry() {
        let cache = ContentCache::new();
        cache.put(entry("abc", "/data/a.json", "foo", 3));
        cache.put(entry("abc", "/data/copy.json", "foo", 3));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_round_trips_through_json_store() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonSnapshotStore::new(dir.path().join("cache.json"));

        let cache = ContentCache::new();
        cache.put(entry("abc", "/data/a.json", "foo", 3));
        cache.put(entry("def", "/data/b.json", "bar", 1));
        store.save(&cache.snapshot()).expect("save");

        let restored = store.load().expect("load");
        assert_eq!(restored, cache.snapshot());
    }

    #[test]
    fn missing_snapshot_is_an_error_for_the_caller_to_absorb() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonSnapshotStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_err());
    }

    #[test]
    fn corrupt_snapshot_is_an_error_not_a_panic() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{ definitely not json").expect("write");
        let store = JsonSnapshotStore::new(path);
        let err = store.load().expect_err("corrupt snapshot must fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
