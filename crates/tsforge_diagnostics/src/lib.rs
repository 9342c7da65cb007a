//! Diagnostic records reported by the compiler service.
//!
//! A [`DiagnosticRecord`] is a plain value: the compiler service produces it,
//! the compile cache stores it verbatim, and the [`DiagnosticSink`] collects it
//! for whichever printer the host wires up. Nothing in this crate formats
//! diagnostics for display.

#![warn(missing_docs)]

pub mod category;
pub mod record;
pub mod severity;
pub mod sink;

pub use category::DiagnosticCategory;
pub use record::{DiagnosticRecord, Position};
pub use severity::Severity;
pub use sink::DiagnosticSink;
