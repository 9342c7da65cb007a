//! Include/exclude filtering of module ids.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tsforge_common::FileId;
use tsforge_config::PluginOptions;

use crate::error::DriverError;

/// Decides which module ids the session handles.
///
/// An id is accepted if it matches an include pattern and no exclude
/// pattern. Virtual ids (prefixed with a NUL byte by the host bundler) are
/// never accepted.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl SourceFilter {
    /// Builds a filter from glob patterns.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, DriverError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    /// Builds the filter configured by `options`.
    pub fn from_options(options: &PluginOptions) -> Result<Self, DriverError> {
        Self::new(&options.include, &options.exclude)
    }

    /// Returns `true` if `id` should be handled.
    pub fn matches(&self, id: &FileId) -> bool {
        let path = id.as_str();
        !path.starts_with('\0') && self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, DriverError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| DriverError::Filter {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| DriverError::Filter {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}
