use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Result;

/// An opaque blob key-value store.
///
/// Each call is assumed atomic on its own; nothing here promises transactions across keys.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn get_multiple(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn set_multiple(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, value) in entries {
            self.set(&key, value)?;
        }
        Ok(())
    }
}

/// Operation counters for a [`MemoryBackend`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub clears: u64,
    pub has: u64,
}

impl BackendStats {
    /// Total number of calls made against the backend; batched calls count once.
    pub fn operations(&self) -> u64 {
        self.gets + self.sets + self.deletes + self.clears + self.has
    }
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    clears: AtomicU64,
    has: AtomicU64,
}

/// In-process backend. Useful on its own for short-lived sessions and as a test double.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    counters: Counters,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> BackendStats {
        BackendStats {
            gets: self.counters.gets.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            clears: self.counters.clears.load(Ordering::Relaxed),
            has: self.counters.has.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Raw access that bypasses the counters, for tests that tamper with stored bytes.
    pub fn raw_insert(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.lock().insert(key.into(), value);
    }

    pub fn raw_get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.counters.clears.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().clear();
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool> {
        self.counters.has.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.lock().contains_key(key))
    }

    fn get_multiple(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.lock();
        Ok(keys.iter().map(|key| entries.get(key).cloned()).collect())
    }

    fn set_multiple(&self, batch: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.counters.sets.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().extend(batch);
        Ok(())
    }
}
