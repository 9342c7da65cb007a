//! Versioned source snapshots read by the compiler service.
//!
//! The [`SnapshotStore`] is the single place where file text enters a build
//! session. Every distinct text observed for a file gets a new, strictly
//! increasing version and a fresh content fingerprint.

#![warn(missing_docs)]

pub mod snapshot;
pub mod snapshot_store;

pub use snapshot::SourceSnapshot;
pub use snapshot_store::{SnapshotChange, SnapshotStore, SnapshotUpdate};
