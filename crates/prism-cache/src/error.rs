pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// A persisted record was written with a different format version.
    #[error("incompatible record format version: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// A persisted record belongs to a different declaration than the one requested.
    #[error("persisted record is for {found}, expected {expected}")]
    IdMismatch { expected: String, found: String },

    #[error("cache backend error: {message}")]
    Backend { message: String },
}
