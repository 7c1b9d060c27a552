//! Change-aware persistence for reflected declaration records.
//!
//! Building blocks, leaves first:
//! - [`Fingerprint`]: SHA-256 content hashes.
//! - [`ChangeDetector`]: "has the source behind this fact changed?" as a plain value.
//! - [`CacheBackend`]: opaque blob key-value stores ([`MemoryBackend`], [`DiskBackend`]).
//! - [`encode_record`] / [`decode_record`]: the versioned record envelope.
//! - [`ChangeAwareCache`]: an in-process staging tier in front of a backend, filtering
//!   stale entries on read.
//!
//! ## Cache keys
//!
//! Backend keys are [`cache_key`]`(prefix, encoded id, format version)`: a fixed-width
//! SHA-256 hex digest. Bumping the format version is the supported way to orphan every
//! previously persisted record after a change to the record shape.

mod backend;
mod cache;
mod detector;
mod disk;
mod envelope;
mod error;
mod fingerprint;
mod persistence;
mod util;

pub use backend::{BackendStats, CacheBackend, MemoryBackend};
pub use cache::{CacheStats, Cacheable, ChangeAwareCache};
pub use detector::{ChangeDetector, DetectorMemo};
pub use disk::{DiskBackend, DISK_BACKEND_SCHEMA_VERSION};
pub use envelope::{cache_key, decode_record, encode_record};
pub use error::{CacheError, Result};
pub use fingerprint::Fingerprint;
pub use persistence::PersistenceMode;
pub use util::{atomic_write, now_millis, BINCODE_PAYLOAD_LIMIT_BYTES};
