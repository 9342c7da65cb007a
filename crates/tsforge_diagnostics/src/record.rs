//! A single compiler-reported issue, stored verbatim by the cache.

use crate::category::DiagnosticCategory;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use tsforge_common::FileId;

/// A 1-indexed line/column location inside a file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed).
    pub column: u32,
}

impl Position {
    /// Creates a position from 1-indexed coordinates.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A diagnostic as produced by the compiler service.
///
/// Records are value types: they round-trip through the persisted cache
/// unchanged, so equality is structural.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// The compiler phase that reported this diagnostic.
    pub category: DiagnosticCategory,
    /// How severe the issue is.
    pub severity: Severity,
    /// Numeric code assigned by the compiler service.
    pub code: u32,
    /// The flattened diagnostic message.
    pub message: String,
    /// The file the diagnostic points into, if any.
    pub file: Option<FileId>,
    /// The start position inside [`file`](Self::file), if known.
    pub position: Option<Position>,
}

impl DiagnosticRecord {
    /// Creates a diagnostic with no location.
    pub fn new(
        category: DiagnosticCategory,
        severity: Severity,
        code: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            code,
            message: message.into(),
            file: None,
            position: None,
        }
    }

    /// Creates an error diagnostic.
    pub fn error(category: DiagnosticCategory, code: u32, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(category: DiagnosticCategory, code: u32, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, code, message)
    }

    /// Attaches the file this diagnostic points into.
    pub fn with_file(mut self, file: FileId) -> Self {
        self.file = Some(file);
        self
    }

    /// Attaches a start position.
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.position = Some(Position::new(line, column));
        self
    }

    /// Returns `true` if this is an error.
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}
