//! Cached value types, cache keys, and the persisted record shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use tsforge_common::{ContentHash, FileId};
use tsforge_config::ConfigFingerprint;
use tsforge_diagnostics::DiagnosticRecord;

use crate::error::CacheError;

/// Upper bound on the decoded size of one [`CacheRecord`].
const MAX_RECORD_BYTES: usize = 256 * 1024 * 1024;

/// A source map in the v3 JSON shape.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMap {
    /// Source map format version, always 3.
    pub version: u32,
    /// Name of the generated file.
    pub file: Option<String>,
    /// Prefix prepended to every entry of [`sources`](Self::sources).
    pub source_root: Option<String>,
    /// Original source files.
    pub sources: Vec<String>,
    /// Inlined original sources, parallel to [`sources`](Self::sources).
    pub sources_content: Option<Vec<Option<String>>>,
    /// Symbol names referenced by the mappings.
    pub names: Vec<String>,
    /// Base64-VLQ encoded mappings.
    pub mappings: String,
}

impl SourceMap {
    /// A map with no mappings, used when the compiler emitted none.
    pub fn empty() -> Self {
        Self {
            version: 3,
            file: None,
            source_root: None,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    /// Parses a source map from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, CacheError> {
        serde_json::from_str(text).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::empty()
    }
}

/// A type declaration file produced alongside the compiled code.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Declaration {
    /// Output path suggested by the compiler service.
    pub path: String,
    /// Declaration text.
    pub text: String,
    /// Whether a byte order mark should precede the text when written.
    pub write_bom: bool,
}

/// Output of compiling one file.
///
/// A missing [`emitted_code`](Self::emitted_code) means emission failed or
/// was skipped; such a result is cached like any other, since it is still a
/// deterministic function of the input.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct CompiledEntry {
    /// The emitted JavaScript.
    pub emitted_code: Option<String>,
    /// Source map for [`emitted_code`](Self::emitted_code).
    pub source_map: Option<SourceMap>,
    /// Type declaration output, when declarations are enabled.
    pub declaration: Option<Declaration>,
}

impl CompiledEntry {
    /// An entry holding only emitted code.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            emitted_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if no code was emitted.
    pub fn emit_failed(&self) -> bool {
        self.emitted_code.is_none()
    }
}

/// Which half of a [`DiagnosticsEntry`] a request is for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DiagnosticKind {
    /// Parse-level diagnostics.
    Syntactic,
    /// Type-checker diagnostics.
    Semantic,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Syntactic => write!(f, "syntactic"),
            DiagnosticKind::Semantic => write!(f, "semantic"),
        }
    }
}

/// Cached diagnostics of one file.
///
/// Each half is filled independently the first time it is requested.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct DiagnosticsEntry {
    /// Syntactic diagnostics, once computed.
    pub syntactic: Option<Vec<DiagnosticRecord>>,
    /// Semantic diagnostics, once computed.
    pub semantic: Option<Vec<DiagnosticRecord>>,
}

impl DiagnosticsEntry {
    /// Returns the requested half, if computed.
    pub fn get(&self, kind: DiagnosticKind) -> Option<&Vec<DiagnosticRecord>> {
        match kind {
            DiagnosticKind::Syntactic => self.syntactic.as_ref(),
            DiagnosticKind::Semantic => self.semantic.as_ref(),
        }
    }

    /// Stores the requested half.
    pub fn set(&mut self, kind: DiagnosticKind, diagnostics: Vec<DiagnosticRecord>) {
        match kind {
            DiagnosticKind::Syntactic => self.syntactic = Some(diagnostics),
            DiagnosticKind::Semantic => self.semantic = Some(diagnostics),
        }
    }
}

/// The two independent keyspaces of the cache.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Keyspace {
    /// [`CompiledEntry`] values.
    Code,
    /// [`DiagnosticsEntry`] values.
    Diagnostics,
}

impl Keyspace {
    /// Subdirectory of the namespace holding this keyspace's artifacts.
    pub fn subdir(self) -> &'static str {
        match self {
            Keyspace::Code => "code",
            Keyspace::Diagnostics => "diagnostics",
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subdir())
    }
}

/// Identity of a cache slot's content.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey {
    /// The file.
    pub file: FileId,
    /// Fingerprint of the file's text.
    pub content: ContentHash,
    /// Fingerprint of the active configuration.
    pub config: ConfigFingerprint,
}

impl CacheKey {
    /// Creates a key.
    pub fn new(file: FileId, content: ContentHash, config: ConfigFingerprint) -> Self {
        Self {
            file,
            content,
            config,
        }
    }

    /// Artifact file stem for this key at the given generation.
    pub fn artifact_key(&self, generation: u64) -> String {
        let generation = generation.to_le_bytes();
        ContentHash::from_parts([
            self.file.as_str().as_bytes(),
            self.content.as_bytes().as_slice(),
            self.config.hash().as_bytes().as_slice(),
            generation.as_slice(),
        ])
        .to_string()
    }
}

/// An in-memory cache value together with what it was computed from.
#[derive(Clone, Debug)]
pub(crate) struct Stamped<V> {
    pub content: ContentHash,
    pub generation: u64,
    pub value: V,
}

impl<V> Stamped<V> {
    pub fn new(content: ContentHash, generation: u64, value: V) -> Self {
        Self {
            content,
            generation,
            value,
        }
    }

    pub fn is_live(&self, key: &CacheKey, generation: u64) -> bool {
        self.content == key.content && self.generation == generation
    }
}

/// One persisted cache slot.
///
/// Code artifacts carry only [`compiled`](Self::compiled), diagnostics
/// artifacts only [`diagnostics`](Self::diagnostics).
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CacheRecord {
    /// The file the slot belongs to.
    pub file_id: FileId,
    /// Fingerprint of the text the values were computed from.
    pub content_fingerprint: ContentHash,
    /// The file's generation when the values were computed.
    pub generation: u64,
    /// Compiled output.
    pub compiled: Option<CompiledEntry>,
    /// Diagnostics.
    pub diagnostics: Option<DiagnosticsEntry>,
}

impl CacheRecord {
    /// Encodes the record as the artifact payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })
    }

    /// Decodes a record from an artifact payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        let limited = bincode::config::standard().with_limit::<MAX_RECORD_BYTES>();
        let (record, _) = bincode::serde::decode_from_slice(bytes, limited).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
        Ok(record)
    }

    /// Checks that this record was computed for `key` at `generation`.
    pub fn validate(self, key: &CacheKey, generation: u64) -> Result<Self, CacheError> {
        let reason = if self.file_id != key.file {
            format!("record belongs to {}", self.file_id)
        } else if self.content_fingerprint != key.content {
            format!(
                "content fingerprint {} != {}",
                self.content_fingerprint, key.content
            )
        } else if self.generation != generation {
            format!("generation {} != {}", self.generation, generation)
        } else {
            return Ok(self);
        };
        Err(CacheError::RecordMismatch {
            file: key.file.to_string(),
            reason,
        })
    }
}
