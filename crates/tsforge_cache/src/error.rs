//! Failures of the on-disk cache namespace.

use std::path::PathBuf;

use thiserror::Error;

/// Something went wrong reading or writing a cache namespace.
///
/// Lookups never surface these: an unreadable artifact is a miss. A failed
/// flush comes back inside [`FlushOutcome::Failed`](crate::FlushOutcome).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem access failed.
    #[error("{path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// `manifest.json` exists but is not a manifest.
    #[error("unreadable manifest: {reason}")]
    ManifestParse {
        /// Parser message.
        reason: String,
    },

    /// The artifact does not start with a decodable tsforge header.
    #[error("{path} is not a tsforge artifact ({reason})")]
    InvalidHeader {
        /// The artifact.
        path: PathBuf,
        /// What was wrong with the header.
        reason: String,
    },

    /// The payload was modified or truncated after it was written.
    #[error("{path} is corrupt: payload hash {actual}, header says {expected}")]
    ChecksumMismatch {
        /// The artifact.
        path: PathBuf,
        /// Hash recorded in the header.
        expected: String,
        /// Hash of the payload as read.
        actual: String,
    },

    /// The artifact uses another cache layout.
    #[error("{path} has cache format {actual}, this build reads format {expected}")]
    VersionMismatch {
        /// The artifact.
        path: PathBuf,
        /// Layout version of this build.
        expected: u32,
        /// Layout version in the header.
        actual: u32,
    },

    /// The artifact was produced by another compiler service version.
    #[error("{path} was produced by compiler {actual}, expected {expected}")]
    ToolMismatch {
        /// The artifact.
        path: PathBuf,
        /// Version of the active compiler service.
        expected: String,
        /// Version recorded in the header.
        actual: String,
    },

    /// A decoded record does not belong to the slot it was loaded for.
    #[error("stale cache record for {file}: {reason}")]
    RecordMismatch {
        /// The file the record was loaded for.
        file: String,
        /// Which field disagreed.
        reason: String,
    },

    /// bincode or JSON encoding failed.
    #[error("cannot encode cache data: {reason}")]
    Serialization {
        /// Encoder message.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` if the error is a missing file, which the cache treats
    /// as an ordinary miss rather than a problem worth logging.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
