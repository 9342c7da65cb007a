//! Parsing and validation of `tsforge.toml` plugin options.
//!
//! This crate reads the plugin options into a strongly-typed
//! [`PluginOptions`] and derives the [`ConfigFingerprint`] that names the
//! cache namespace for a given compiler configuration.

#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use fingerprint::ConfigFingerprint;
pub use loader::{load_options, load_options_from_str, OPTIONS_FILE};
pub use types::*;
