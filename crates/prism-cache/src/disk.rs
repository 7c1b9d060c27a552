use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::util::{
    atomic_write, bincode_deserialize, bincode_serialize, now_millis, read_file_limited,
    remove_file_best_effort,
};

pub const DISK_BACKEND_SCHEMA_VERSION: u32 = 1;

/// One file per key under a root directory.
///
/// File names are the fingerprint of the key; the full key is stored alongside the
/// value so a fingerprint collision reads as a miss instead of returning another
/// key's bytes. Every file is stamped with the schema and prism versions.
#[derive(Clone, Debug)]
pub struct DiskBackend {
    root: PathBuf,
}

#[derive(Serialize)]
struct PersistedEntry<'a> {
    schema_version: u32,
    prism_version: &'a str,
    saved_at_millis: u64,
    key: &'a str,
    value: &'a [u8],
}

#[derive(Deserialize)]
struct PersistedEntryOwned {
    schema_version: u32,
    prism_version: String,
    #[allow(dead_code)]
    saved_at_millis: u64,
    key: String,
    value: Vec<u8>,
}

impl DiskBackend {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let fingerprint = Fingerprint::from_bytes(key.as_bytes());
        self.root.join(format!("{}.bin", fingerprint.as_str()))
    }
}

impl CacheBackend for DiskBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let Some(bytes) = read_file_limited(&path) else {
            return Ok(None);
        };

        let persisted: PersistedEntryOwned = match bincode_deserialize(&bytes) {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::debug!(
                    target: "prism.cache",
                    path = %path.display(),
                    error = %err,
                    "dropping undecodable cache file"
                );
                remove_file_best_effort(&path, "disk_backend.corrupt");
                return Ok(None);
            }
        };

        if persisted.schema_version != DISK_BACKEND_SCHEMA_VERSION
            || persisted.prism_version != prism_core::PRISM_VERSION
        {
            remove_file_best_effort(&path, "disk_backend.version");
            return Ok(None);
        }

        // Collision: leave the file alone, it belongs to the other key.
        if persisted.key != key {
            return Ok(None);
        }

        Ok(Some(persisted.value))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let persisted = PersistedEntry {
            schema_version: DISK_BACKEND_SCHEMA_VERSION,
            prism_version: prism_core::PRISM_VERSION,
            saved_at_millis: now_millis(),
            key,
            value: &value,
        };
        let bytes = bincode_serialize(&persisted)?;
        atomic_write(&self.entry_path(key), &bytes)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("bin") {
                remove_file_best_effort(&path, "disk_backend.clear");
            }
        }
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
