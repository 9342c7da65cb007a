//! A file's text captured at a point in time.

use std::sync::Arc;

use tsforge_common::{ContentHash, FileId};

/// Immutable view of a file's text at one version.
///
/// Snapshots are cheap to clone: the text is shared. Only the
/// [`SnapshotStore`](crate::SnapshotStore) creates them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSnapshot {
    id: FileId,
    text: Arc<str>,
    version: u64,
    fingerprint: ContentHash,
}

impl SourceSnapshot {
    pub(crate) fn new(id: FileId, text: &str, version: u64) -> Self {
        Self {
            id,
            fingerprint: ContentHash::from_bytes(text.as_bytes()),
            text: Arc::from(text),
            version,
        }
    }

    /// The file this snapshot belongs to.
    pub fn id(&self) -> &FileId {
        &self.id
    }

    /// The full text of the file.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Version number, strictly increasing per file across distinct texts.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Content fingerprint of [`text`](Self::text).
    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    /// Length of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns `true` if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
