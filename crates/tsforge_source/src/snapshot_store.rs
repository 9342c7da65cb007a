//! Central table of the current snapshot of every observed file.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tsforge_common::{ContentHash, FileId};

use crate::snapshot::SourceSnapshot;

/// What a call to [`SnapshotStore::set_snapshot`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotChange {
    /// The file had not been observed before.
    Created,
    /// The text differed from the stored text.
    Replaced {
        /// Fingerprint of the text that was replaced.
        previous: ContentHash,
    },
    /// The text was identical; the stored snapshot was returned untouched.
    Unchanged,
}

/// Result of submitting text for a file.
#[derive(Clone, Debug)]
pub struct SnapshotUpdate {
    /// The snapshot now current for the file.
    pub snapshot: SourceSnapshot,
    /// How the store changed.
    pub change: SnapshotChange,
}

impl SnapshotUpdate {
    /// Returns `true` unless the submission was a no-op.
    pub fn is_changed(&self) -> bool {
        self.change != SnapshotChange::Unchanged
    }
}

/// Holds the current text and version of every known file.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    files: BTreeMap<FileId, SourceSnapshot>,
}

impl SnapshotStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `text` as the current content of `id`.
    ///
    /// A new version is created when the file is unknown or its stored text
    /// differs; resubmitting identical text returns the existing snapshot.
    pub fn set_snapshot(&mut self, id: FileId, text: &str) -> SnapshotUpdate {
        let (version, change) = match self.files.get(&id) {
            Some(current) if current.text() == text => {
                return SnapshotUpdate {
                    snapshot: current.clone(),
                    change: SnapshotChange::Unchanged,
                };
            }
            Some(current) => (
                current.version() + 1,
                SnapshotChange::Replaced {
                    previous: current.fingerprint(),
                },
            ),
            None => (1, SnapshotChange::Created),
        };

        let snapshot = SourceSnapshot::new(id.clone(), text, version);
        self.files.insert(id, snapshot.clone());
        SnapshotUpdate { snapshot, change }
    }

    /// Reads a file from disk and records its text under its path.
    pub fn read_file(&mut self, path: &Path) -> Result<SnapshotUpdate, io::Error> {
        let text = std::fs::read_to_string(path)?;
        let id = FileId::new(path.to_string_lossy());
        Ok(self.set_snapshot(id, &text))
    }

    /// Returns the current snapshot of `id`, if the file has been observed.
    pub fn get_snapshot(&self, id: &FileId) -> Option<&SourceSnapshot> {
        self.files.get(id)
    }

    /// All files ever observed, in id order.
    pub fn known_file_ids(&self) -> impl Iterator<Item = &FileId> + '_ {
        self.files.keys()
    }

    /// Number of observed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file has been observed.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
