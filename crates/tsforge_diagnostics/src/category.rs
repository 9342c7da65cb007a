//! Which phase of the compiler service reported a diagnostic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The compiler phase a diagnostic came from.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum DiagnosticCategory {
    /// Reported while parsing a single file.
    Syntax,
    /// Reported by the type checker; may depend on other files.
    Semantic,
    /// Reported against the compiler configuration itself.
    Options,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::Syntax => write!(f, "syntax"),
            DiagnosticCategory::Semantic => write!(f, "semantic"),
            DiagnosticCategory::Options => write!(f, "options"),
        }
    }
}
