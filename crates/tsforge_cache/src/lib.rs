//! Incremental compile cache with dependency-driven invalidation.
//!
//! The [`CompileCache`] memoizes compiled output and diagnostics per file,
//! keyed by the file's content fingerprint and the active configuration
//! fingerprint. When a file's content changes, every file connected to it in
//! the [`DependencyGraph`] has its generation bumped, so its cached results
//! are recomputed on next access even though its own text is unchanged.
//!
//! Persistence is explicit: results computed during a round are written to a
//! per-configuration namespace under the cache root by [`CompileCache::done`].
//! Storage problems never fail a build; they degrade to cache misses.

#![warn(missing_docs)]

pub mod artifact;
pub mod cache;
pub mod computable;
pub mod entry;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod store;

pub use cache::{CompileCache, FlushOutcome};
pub use computable::Computable;
pub use entry::{
    CacheKey, CacheRecord, CompiledEntry, Declaration, DiagnosticKind, DiagnosticsEntry, Keyspace,
    SourceMap,
};
pub use error::CacheError;
pub use graph::{DependencyEdge, DependencyGraph};
pub use manifest::{CacheManifest, FileState};
pub use store::{KeyedStore, MemoryStore};
