//! Per-namespace manifest tracking file fingerprints, generations, artifact
//! keys, and dependency edges.
//!
//! The manifest is stored as `manifest.json` in the namespace directory. It
//! is written last during a flush, so every artifact key it names already
//! exists on disk. All maps are ordered, so the same logical state always
//! serializes to the same bytes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tsforge_common::{ContentHash, FileId, CACHE_FORMAT_VERSION};
use tsforge_config::ConfigFingerprint;

use crate::artifact::write_atomic;
use crate::entry::Keyspace;
use crate::error::CacheError;
use crate::graph::DependencyEdge;

/// Name of the manifest file within a namespace directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Persisted index of one cache namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Cache layout version that wrote this manifest.
    pub format_version: u32,

    /// Compiler service version that produced the cached values.
    pub tool_version: String,

    /// Configuration fingerprint this namespace belongs to.
    pub config: ConfigFingerprint,

    /// Per-file state, keyed by file id.
    pub files: BTreeMap<FileId, FileState>,

    /// Every recorded dependency edge.
    pub edges: Vec<DependencyEdge>,
}

/// Cache state of a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Fingerprint of the file's text when last observed.
    pub content_fingerprint: Option<ContentHash>,

    /// Number of times a connected file's content change invalidated this
    /// file's cached results.
    pub generation: u64,

    /// Artifact key of the persisted compiled entry.
    pub code_key: Option<String>,

    /// Artifact key of the persisted diagnostics entry.
    pub diagnostics_key: Option<String>,
}

impl FileState {
    /// Artifact key for the given keyspace.
    pub fn key(&self, keyspace: Keyspace) -> Option<&str> {
        match keyspace {
            Keyspace::Code => self.code_key.as_deref(),
            Keyspace::Diagnostics => self.diagnostics_key.as_deref(),
        }
    }

    /// Sets the artifact key for the given keyspace.
    pub fn set_key(&mut self, keyspace: Keyspace, key: String) {
        match keyspace {
            Keyspace::Code => self.code_key = Some(key),
            Keyspace::Diagnostics => self.diagnostics_key = Some(key),
        }
    }
}

impl CacheManifest {
    /// Creates an empty manifest.
    pub fn new(tool_version: &str, config: ConfigFingerprint) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            tool_version: tool_version.to_string(),
            config,
            files: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Loads the manifest from a namespace directory.
    ///
    /// Returns `Ok(None)` if no manifest exists yet.
    pub fn load(dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = dir.join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::ManifestParse {
                reason: e.to_string(),
            })
    }

    /// Atomically writes the manifest into a namespace directory, creating
    /// the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(&dir.join(MANIFEST_FILE), json.as_bytes())
    }

    /// Returns `true` if this manifest can serve the given configuration.
    pub fn is_compatible(&self, tool_version: &str, config: ConfigFingerprint) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
            && self.tool_version == tool_version
            && self.config == config
    }

    /// Current generation of `id` (0 if never bumped).
    pub fn generation(&self, id: &FileId) -> u64 {
        self.files.get(id).map_or(0, |f| f.generation)
    }

    /// Last observed content fingerprint of `id`.
    pub fn content_fingerprint(&self, id: &FileId) -> Option<ContentHash> {
        self.files.get(id).and_then(|f| f.content_fingerprint)
    }

    /// Mutable state of `id`, created on first use.
    pub fn file_mut(&mut self, id: &FileId) -> &mut FileState {
        self.files.entry(id.clone()).or_default()
    }
}
