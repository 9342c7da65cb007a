//! How serious a reported diagnostic is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity as reported by the compiler service.
///
/// Variants are declared from least to most severe, so the derived ordering
/// can be used for verbosity thresholds (`severity >= Severity::Warning`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Informational output.
    Message,
    /// An editor-style hint such as an unused binding.
    Suggestion,
    /// Reported, but emission still succeeds.
    Warning,
    /// The program is not type-correct.
    Error,
}

impl Severity {
    /// Every severity, least severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Message,
        Severity::Suggestion,
        Severity::Warning,
        Severity::Error,
    ];

    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Lowercase name as printed in diagnostics output.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Message => "message",
            Severity::Suggestion => "suggestion",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
