use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Decides, on demand, whether the fact it accompanies is stale.
///
/// Detectors are plain values: evaluating [`ChangeDetector::changed`] reads the file
/// system but never mutates anything. Anything that cannot be read counts as changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeDetector {
    AlwaysFresh,
    NeverFresh,
    FileContents {
        path: PathBuf,
        fingerprint: Fingerprint,
    },
    /// The byte range `start..end` of a file.
    FileRegion {
        path: PathBuf,
        start: u64,
        end: u64,
        fingerprint: Fingerprint,
    },
    /// Changed as soon as any member reports changed.
    Composite(Vec<ChangeDetector>),
}

impl Default for ChangeDetector {
    fn default() -> Self {
        ChangeDetector::AlwaysFresh
    }
}

impl ChangeDetector {
    /// Fingerprint the current contents of `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        Ok(Self::FileContents {
            path: path.to_path_buf(),
            fingerprint: Fingerprint::from_file(path)?,
        })
    }

    /// Like [`ChangeDetector::from_file`] for contents the caller already read.
    pub fn from_contents(path: impl AsRef<Path>, contents: &[u8]) -> Self {
        Self::FileContents {
            path: path.as_ref().to_path_buf(),
            fingerprint: Fingerprint::from_bytes(contents),
        }
    }

    /// Fingerprint `region` of `contents`, the current contents of `path`.
    ///
    /// A region outside `contents` is clamped to its end.
    pub fn from_region(path: impl AsRef<Path>, contents: &[u8], region: Range<usize>) -> Self {
        let end = region.end.min(contents.len());
        let start = region.start.min(end);
        Self::FileRegion {
            path: path.as_ref().to_path_buf(),
            start: start as u64,
            end: end as u64,
            fingerprint: Fingerprint::from_bytes(&contents[start..end]),
        }
    }

    /// Combine detectors: flattens nested composites, drops fresh members and duplicates.
    pub fn composite(detectors: impl IntoIterator<Item = ChangeDetector>) -> Self {
        let mut flat: Vec<ChangeDetector> = Vec::new();
        let mut pending: Vec<ChangeDetector> = detectors.into_iter().collect();
        pending.reverse();

        while let Some(detector) = pending.pop() {
            match detector {
                ChangeDetector::AlwaysFresh => {}
                ChangeDetector::NeverFresh => return ChangeDetector::NeverFresh,
                ChangeDetector::Composite(inner) => pending.extend(inner.into_iter().rev()),
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }

        match flat.len() {
            0 => ChangeDetector::AlwaysFresh,
            1 => flat.pop().unwrap_or_default(),
            _ => ChangeDetector::Composite(flat),
        }
    }

    pub fn changed(&self) -> bool {
        match self {
            ChangeDetector::AlwaysFresh => false,
            ChangeDetector::NeverFresh => true,
            ChangeDetector::FileContents { path, fingerprint } => {
                match Fingerprint::from_file(path) {
                    Ok(current) => current != *fingerprint,
                    Err(err) => {
                        tracing::debug!(
                            target: "prism.cache",
                            path = %path.display(),
                            error = %err,
                            "unreadable file treated as changed"
                        );
                        true
                    }
                }
            }
            ChangeDetector::FileRegion {
                path,
                start,
                end,
                fingerprint,
            } => {
                let contents = match std::fs::read(path) {
                    Ok(contents) => contents,
                    Err(err) => {
                        tracing::debug!(
                            target: "prism.cache",
                            path = %path.display(),
                            error = %err,
                            "unreadable file treated as changed"
                        );
                        return true;
                    }
                };
                let (start, end) = (*start as usize, *end as usize);
                if end > contents.len() || start > end {
                    return true;
                }
                Fingerprint::from_bytes(&contents[start..end]) != *fingerprint
            }
            ChangeDetector::Composite(detectors) => detectors.iter().any(ChangeDetector::changed),
        }
    }
}

/// One detector evaluation, computed at most once.
///
/// Hashing files is not free; a record instance checked repeatedly should pay once.
#[derive(Debug)]
pub struct DetectorMemo<'a> {
    detector: &'a ChangeDetector,
    changed: OnceLock<bool>,
}

impl<'a> DetectorMemo<'a> {
    pub fn new(detector: &'a ChangeDetector) -> Self {
        Self {
            detector,
            changed: OnceLock::new(),
        }
    }

    pub fn changed(&self) -> bool {
        *self.changed.get_or_init(|| self.detector.changed())
    }
}
