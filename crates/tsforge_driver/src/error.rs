//! Error types for the build driver.

use std::path::PathBuf;

use thiserror::Error;
use tsforge_common::FileId;
use tsforge_config::ConfigError;

/// Errors that stop a build.
///
/// Cache problems never appear here: they degrade to recomputation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The compiler service produced no output for a file and the options
    /// ask to abort in that case.
    #[error("failed to transpile '{id}'")]
    EmitFailed {
        /// The file that failed.
        id: FileId,
    },

    /// Options could not be loaded or fingerprinted.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An include or exclude pattern is not a valid glob.
    #[error("invalid file pattern '{pattern}': {reason}")]
    Filter {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A declaration file could not be written.
    #[error("failed to write declaration {path}: {source}")]
    DeclarationWrite {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
