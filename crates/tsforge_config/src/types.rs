//! Option types deserialized from `tsforge.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Plugin options controlling checking, caching, and file selection.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginOptions {
    /// Whether to run and report syntactic and semantic checks.
    pub check: bool,
    /// Discard the cache namespace before the first round.
    pub clean: bool,
    /// Root directory of the on-disk cache.
    pub cache_root: PathBuf,
    /// Fail the build when a file cannot be emitted.
    pub abort_on_error: bool,
    /// Minimum level of diagnostics forwarded to the printer.
    pub verbosity: Verbosity,
    /// Glob patterns of files handed to the compiler service.
    pub include: Vec<String>,
    /// Glob patterns removed from [`include`](Self::include).
    pub exclude: Vec<String>,
    /// Write declarations where the compiler service puts them instead of
    /// next to the bundle.
    pub use_tsconfig_declaration_dir: bool,
    /// Compiler options passed through to the compiler service.
    ///
    /// These are opaque to tsforge; they only feed the configuration
    /// fingerprint.
    pub compiler: BTreeMap<String, toml::Value>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            check: true,
            clean: false,
            cache_root: PathBuf::from(".tsforge_cache"),
            abort_on_error: true,
            verbosity: Verbosity::Warning,
            include: vec!["**/*.ts".to_string(), "**/*.tsx".to_string()],
            exclude: vec!["**/*.d.ts".to_string()],
            use_tsconfig_declaration_dir: false,
            compiler: BTreeMap::new(),
        }
    }
}

/// How much the plugin reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warning,
    /// Adds informational messages and suggestions.
    Info,
    /// Everything.
    Debug,
}
