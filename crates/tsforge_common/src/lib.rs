//! Shared foundational types used across the tsforge build integration.
//!
//! This crate provides the content hash used for every cache fingerprint and
//! the [`FileId`] that names a source file across processes and build rounds.

#![warn(missing_docs)]

pub mod file_id;
pub mod hash;

pub use file_id::FileId;
pub use hash::ContentHash;

/// Version of the on-disk cache layout. Bump whenever the manifest, the
/// artifact header, or the persisted record shape changes incompatibly.
pub const CACHE_FORMAT_VERSION: u32 = 1;
