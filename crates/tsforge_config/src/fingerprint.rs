//! Fingerprint of everything that affects compiler output.

use serde::{Deserialize, Serialize};
use std::fmt;
use tsforge_common::{ContentHash, FileId, CACHE_FORMAT_VERSION};

use crate::error::ConfigError;
use crate::types::PluginOptions;

/// Summary hash of the active compiler configuration.
///
/// Covers the cache format version, the compiler service version, the
/// compiler options, and the entry file list. Any change produces a new
/// fingerprint and therefore a fresh cache namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ConfigFingerprint(ContentHash);

impl ConfigFingerprint {
    /// Computes the fingerprint for the given options and compiler version.
    ///
    /// Compiler options are canonicalized through ordered TOML serialization,
    /// so key order in the source file does not matter. Entry files are
    /// sorted before hashing.
    pub fn compute(
        options: &PluginOptions,
        compiler_version: &str,
        entry_files: &[FileId],
    ) -> Result<Self, ConfigError> {
        let compiler = toml::to_string(&options.compiler)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        let mut entries: Vec<&str> = entry_files.iter().map(FileId::as_str).collect();
        entries.sort_unstable();
        entries.dedup();

        let format_version = CACHE_FORMAT_VERSION.to_le_bytes();
        let mut parts: Vec<&[u8]> = vec![
            format_version.as_slice(),
            compiler_version.as_bytes(),
            compiler.as_bytes(),
        ];
        parts.extend(entries.iter().map(|e| e.as_bytes()));
        Ok(Self(ContentHash::from_parts(parts)))
    }

    /// Wraps an existing hash, e.g. one read back from a manifest.
    pub fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// The underlying hash.
    pub fn hash(&self) -> ContentHash {
        self.0
    }

    /// Directory name of the cache namespace for this fingerprint.
    pub fn namespace(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_options_from_str;

    fn entries() -> Vec<FileId> {
        vec![FileId::from("src/main.ts"), FileId::from("src/util.ts")]
    }

    #[test]
    fn deterministic() {
        let options = PluginOptions::default();
        let a = ConfigFingerprint::compute(&options, "5.4.2", &entries()).unwrap();
        let b = ConfigFingerprint::compute(&options, "5.4.2", &entries()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.namespace().len(), 32);
    }

    #[test]
    fn compiler_option_key_order_is_irrelevant() {
        let a = load_options_from_str("[compiler]\ntarget = \"es5\"\nstrict = true").unwrap();
        let b = load_options_from_str("[compiler]\nstrict = true\ntarget = \"es5\"").unwrap();
        assert_eq!(
            ConfigFingerprint::compute(&a, "5.4.2", &[]).unwrap(),
            ConfigFingerprint::compute(&b, "5.4.2", &[]).unwrap()
        );
    }

    #[test]
    fn compiler_option_change_changes_fingerprint() {
        let a = load_options_from_str("[compiler]\ntarget = \"es5\"").unwrap();
        let b = load_options_from_str("[compiler]\ntarget = \"es2017\"").unwrap();
        assert_ne!(
            ConfigFingerprint::compute(&a, "5.4.2", &[]).unwrap(),
            ConfigFingerprint::compute(&b, "5.4.2", &[]).unwrap()
        );
    }

    #[test]
    fn compiler_version_change_changes_fingerprint() {
        let options = PluginOptions::default();
        assert_ne!(
            ConfigFingerprint::compute(&options, "5.4.2", &[]).unwrap(),
            ConfigFingerprint::compute(&options, "5.5.0", &[]).unwrap()
        );
    }

    #[test]
    fn entry_order_is_irrelevant() {
        let options = PluginOptions::default();
        let mut reversed = entries();
        reversed.reverse();
        assert_eq!(
            ConfigFingerprint::compute(&options, "5.4.2", &entries()).unwrap(),
            ConfigFingerprint::compute(&options, "5.4.2", &reversed).unwrap()
        );
    }

    #[test]
    fn non_compiler_options_do_not_matter() {
        let a = load_options_from_str("check = true").unwrap();
        let b = load_options_from_str("check = false\nverbosity = \"debug\"").unwrap();
        assert_eq!(
            ConfigFingerprint::compute(&a, "5.4.2", &[]).unwrap(),
            ConfigFingerprint::compute(&b, "5.4.2", &[]).unwrap()
        );
    }

    #[test]
    fn serde_roundtrip() {
        let fp = ConfigFingerprint::compute(&PluginOptions::default(), "5.4.2", &[]).unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        let back: ConfigFingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
