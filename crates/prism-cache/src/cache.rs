use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use prism_core::DeclId;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::CacheBackend;
use crate::detector::{ChangeDetector, DetectorMemo};
use crate::envelope::{cache_key, decode_record, encode_record};
use crate::error::{CacheError, Result};
use crate::persistence::PersistenceMode;

/// A value that can live in a [`ChangeAwareCache`].
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The detector deciding whether a persisted copy is still valid. `None` means
    /// the value never goes stale.
    fn change_detector(&self) -> Option<&ChangeDetector>;
}

type Producer<V> = Box<dyn FnOnce() -> V + Send>;

enum Staged<V> {
    Pending(Producer<V>),
    Resolved(Arc<V>),
}

impl<V> fmt::Debug for Staged<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staged::Pending(_) => f.write_str("Pending"),
            Staged::Resolved(_) => f.write_str("Resolved"),
        }
    }
}

/// Read-side counters of a [`ChangeAwareCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub staged_hits: u64,
    pub backend_hits: u64,
    pub misses: u64,
    /// Backend entries rejected because their detector reported a change.
    pub stale: u64,
    /// Backend entries rejected because they were written in another record format.
    pub version_mismatches: u64,
    pub commits: u64,
}

#[derive(Debug, Default)]
struct Counters {
    staged_hits: AtomicU64,
    backend_hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    version_mismatches: AtomicU64,
    commits: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Two tiers: an in-process staging area in front of a persistent [`CacheBackend`].
///
/// Staged writes are visible to reads immediately and reach the backend on
/// [`ChangeAwareCache::commit`]. Backend entries whose change detector reports a change
/// are treated exactly like absent ones.
pub struct ChangeAwareCache<V> {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    format_version: u32,
    mode: PersistenceMode,
    staged: Mutex<BTreeMap<String, Staged<V>>>,
    counters: Counters,
}

impl<V> fmt::Debug for ChangeAwareCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeAwareCache")
            .field("prefix", &self.prefix)
            .field("format_version", &self.format_version)
            .field("mode", &self.mode)
            .field("staged", &self.staged.lock().len())
            .finish_non_exhaustive()
    }
}

impl<V: Cacheable> ChangeAwareCache<V> {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>, format_version: u32) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            format_version,
            mode: PersistenceMode::ReadWrite,
            staged: Mutex::new(BTreeMap::new()),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: PersistenceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn key_for(&self, id: &DeclId) -> String {
        cache_key(&self.prefix, &id.encode(), self.format_version)
    }

    /// Look `id` up in staging, then in the backend.
    ///
    /// Never fails: backend errors, undecodable entries and stale entries are all
    /// reported as a miss.
    pub fn get(&self, id: &DeclId) -> Option<Arc<V>> {
        let encoded = id.encode();
        if let Some(value) = self.get_staged(&encoded) {
            bump(&self.counters.staged_hits);
            return Some(value);
        }

        if !self.mode.allows_read() {
            bump(&self.counters.misses);
            return None;
        }

        match self.load(&encoded) {
            Some(value) => {
                bump(&self.counters.backend_hits);
                Some(Arc::new(value))
            }
            None => {
                bump(&self.counters.misses);
                None
            }
        }
    }

    fn get_staged(&self, encoded: &str) -> Option<Arc<V>> {
        let producer = {
            let mut staged = self.staged.lock();
            match staged.remove(encoded)? {
                Staged::Resolved(value) => {
                    staged.insert(encoded.to_string(), Staged::Resolved(value.clone()));
                    return Some(value);
                }
                Staged::Pending(producer) => producer,
            }
        };

        // Run outside the lock: producers may read the cache themselves.
        let value = Arc::new(producer());
        let mut staged = self.staged.lock();
        let entry = staged
            .entry(encoded.to_string())
            .or_insert_with(|| Staged::Resolved(value.clone()));
        match entry {
            Staged::Resolved(existing) => Some(existing.clone()),
            Staged::Pending(_) => {
                // Restaged while we were producing; the newer producer wins.
                Some(value)
            }
        }
    }

    fn load(&self, encoded: &str) -> Option<V> {
        let key = cache_key(&self.prefix, encoded, self.format_version);
        let bytes = match self.backend.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(
                    target: "prism.cache",
                    id = encoded,
                    error = %err,
                    "cache backend read failed"
                );
                return None;
            }
        };

        let value: V = match decode_record(&bytes, self.format_version, encoded) {
            Ok(value) => value,
            Err(CacheError::VersionMismatch { expected, found }) => {
                bump(&self.counters.version_mismatches);
                tracing::debug!(
                    target: "prism.cache",
                    id = encoded,
                    expected,
                    found,
                    "ignoring record from another format version"
                );
                return None;
            }
            Err(err) => {
                tracing::debug!(
                    target: "prism.cache",
                    id = encoded,
                    error = %err,
                    "ignoring undecodable cache record"
                );
                return None;
            }
        };

        if let Some(detector) = value.change_detector() {
            if DetectorMemo::new(detector).changed() {
                bump(&self.counters.stale);
                tracing::debug!(target: "prism.cache", id = encoded, "stale cache record");
                return None;
            }
        }
        Some(value)
    }

    /// Register a deferred record for `id`. The producer runs on first read or on commit,
    /// whichever comes first; restaging replaces any earlier entry.
    pub fn stage_for_commit(&self, id: &DeclId, producer: impl FnOnce() -> V + Send + 'static) {
        self.staged
            .lock()
            .insert(id.encode(), Staged::Pending(Box::new(producer)));
    }

    pub fn stage_resolved(&self, id: &DeclId, value: Arc<V>) {
        self.staged.lock().insert(id.encode(), Staged::Resolved(value));
    }

    pub fn staged_len(&self) -> usize {
        self.staged.lock().len()
    }

    /// Flush every staged entry to the backend in one batched write and clear staging.
    ///
    /// Returns the number of entries written. With nothing staged the backend is not
    /// touched; a persistence mode that forbids writes drops the staged entries.
    pub fn commit(&self) -> Result<usize> {
        let staged = std::mem::take(&mut *self.staged.lock());
        if staged.is_empty() {
            return Ok(0);
        }
        if !self.mode.allows_write() {
            tracing::debug!(
                target: "prism.cache",
                mode = ?self.mode,
                dropped = staged.len(),
                "persistence disabled; discarding staged records"
            );
            return Ok(0);
        }

        let mut batch = Vec::with_capacity(staged.len());
        for (encoded, entry) in staged {
            let value = match entry {
                Staged::Resolved(value) => value,
                Staged::Pending(producer) => Arc::new(producer()),
            };
            let bytes = encode_record(&encoded, self.format_version, value.as_ref())?;
            batch.push((cache_key(&self.prefix, &encoded, self.format_version), bytes));
        }

        let written = batch.len();
        self.backend.set_multiple(batch)?;
        bump(&self.counters.commits);
        tracing::debug!(target: "prism.cache", written, "committed staged records");
        Ok(written)
    }

    /// Drop staged entries without writing them.
    pub fn discard_staged(&self) {
        self.staged.lock().clear();
    }

    pub fn delete(&self, id: &DeclId) -> Result<()> {
        let encoded = id.encode();
        self.staged.lock().remove(&encoded);
        if self.mode.allows_write() {
            self.backend
                .delete(&cache_key(&self.prefix, &encoded, self.format_version))?;
        }
        Ok(())
    }

    /// Clear staging and the backend.
    pub fn clear(&self) -> Result<()> {
        self.discard_staged();
        if self.mode.allows_write() {
            self.backend.clear()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheStats {
            staged_hits: load(&self.counters.staged_hits),
            backend_hits: load(&self.counters.backend_hits),
            misses: load(&self.counters.misses),
            stale: load(&self.counters.stale),
            version_mismatches: load(&self.counters.version_mismatches),
            commits: load(&self.counters.commits),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde::Deserialize;

    use super::*;
    use crate::backend::MemoryBackend;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        value: String,
        detector: Option<ChangeDetector>,
    }

    impl Record {
        fn fresh(value: &str) -> Self {
            Self {
                value: value.to_string(),
                detector: Some(ChangeDetector::AlwaysFresh),
            }
        }
    }

    impl Cacheable for Record {
        fn change_detector(&self) -> Option<&ChangeDetector> {
            self.detector.as_ref()
        }
    }

    fn cache(backend: &Arc<MemoryBackend>) -> ChangeAwareCache<Record> {
        ChangeAwareCache::new(backend.clone(), "test", 1)
    }

    #[test]
    fn staged_reads_do_not_touch_the_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let id = DeclId::class("App\\User");

        cache.stage_for_commit(&id, || Record::fresh("user"));
        assert_eq!(cache.get(&id).unwrap().value, "user");
        assert_eq!(backend.stats().operations(), 0);
        assert_eq!(cache.stats().staged_hits, 1);
    }

    #[test]
    fn producers_run_at_most_once() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let id = DeclId::function("helper");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        cache.stage_for_commit(&id, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Record::fresh("helper")
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        cache.get(&id).unwrap();
        cache.get(&id).unwrap();
        assert_eq!(cache.commit().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unread_producers_run_on_commit() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let id = DeclId::constant("VERSION");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        cache.stage_for_commit(&id, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Record::fresh("1.0")
        });
        cache.commit().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn empty_commit_is_a_no_op() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        assert_eq!(cache.commit().unwrap(), 0);
        assert_eq!(backend.stats().operations(), 0);
        assert_eq!(cache.stats().commits, 0);
    }

    #[test]
    fn commit_is_one_batched_write_then_reads_hit_the_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let a = DeclId::class("A");
        let b = DeclId::class("B");
        cache.stage_for_commit(&a, || Record::fresh("a"));
        cache.stage_for_commit(&b, || Record::fresh("b"));

        assert_eq!(cache.commit().unwrap(), 2);
        assert_eq!(backend.stats().sets, 1);
        assert_eq!(cache.staged_len(), 0);

        assert_eq!(cache.get(&a).unwrap().value, "a");
        assert_eq!(cache.stats().backend_hits, 1);
    }

    #[test]
    fn stale_entries_are_misses_but_stay_in_the_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let id = DeclId::class("Stale");
        cache.stage_for_commit(&id, || Record {
            value: "old".to_string(),
            detector: Some(ChangeDetector::NeverFresh),
        });
        cache.commit().unwrap();

        assert!(cache.get(&id).is_none());
        assert_eq!(cache.stats().stale, 1);
        assert!(backend.raw_get(&cache.key_for(&id)).is_some());
    }

    #[test]
    fn format_version_bump_misses_old_records() {
        let backend = Arc::new(MemoryBackend::new());
        let id = DeclId::class("A");

        let v1 = cache(&backend);
        v1.stage_for_commit(&id, || Record::fresh("a"));
        v1.commit().unwrap();

        // Same key, different envelope version: simulate a record written by an old build.
        let v2: ChangeAwareCache<Record> = ChangeAwareCache::new(backend.clone(), "test", 2);
        let old_bytes = backend.raw_get(&v1.key_for(&id)).unwrap();
        backend.raw_insert(v2.key_for(&id), old_bytes);

        assert!(v2.get(&id).is_none());
        assert_eq!(v2.stats().version_mismatches, 1);
    }

    #[test]
    fn read_only_mode_never_writes() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend).with_mode(PersistenceMode::ReadOnly);
        let id = DeclId::class("A");
        cache.stage_for_commit(&id, || Record::fresh("a"));

        assert_eq!(cache.commit().unwrap(), 0);
        assert!(backend.is_empty());
        assert!(cache.get(&id).is_none());
    }

    #[test]
    fn discard_and_delete() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache(&backend);
        let a = DeclId::class("A");
        cache.stage_for_commit(&a, || Record::fresh("a"));
        cache.discard_staged();
        assert!(cache.get(&a).is_none());

        cache.stage_resolved(&a, Arc::new(Record::fresh("a")));
        cache.commit().unwrap();
        cache.delete(&a).unwrap();
        assert!(cache.get(&a).is_none());
        assert!(backend.is_empty());
    }
}
