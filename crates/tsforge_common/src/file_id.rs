//! Stable identity of a source file across build rounds and processes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a source file as seen by the bundler and the compiler
/// service.
///
/// Unlike a session-local index, a `FileId` is the normalized path string
/// itself, so it survives process restarts and can key persisted cache
/// records. Backslash separators are normalized to `/` on construction.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    /// Creates a `FileId` from a path-like string, normalizing separators.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(path.as_ref().replace('\\', "/"))
    }

    /// Returns the normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({:?})", self.0)
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for FileId {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
