//! The compiler service seam.

use tsforge_diagnostics::DiagnosticRecord;
use tsforge_source::SourceSnapshot;

/// One file produced by an emit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OutputFile {
    /// Output path suggested by the service. Its suffix identifies the kind
    /// of output (`.js`, `.map`, `.d.ts`).
    pub name: String,
    /// File contents.
    pub text: String,
    /// Whether a byte order mark should precede the contents.
    pub write_bom: bool,
}

/// Result of emitting one file.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct EmitOutput {
    /// The service produced no usable output.
    pub emit_skipped: bool,
    /// Everything written by the emit.
    pub output_files: Vec<OutputFile>,
}

/// A compiler that can emit and check individual files.
///
/// Implementations must be deterministic for a given snapshot and
/// configuration: the build session caches their results.
pub trait CompilerService {
    /// Version string of the compiler, part of every cache namespace.
    fn version(&self) -> &str;

    /// Compiles one file.
    fn emit(&mut self, snapshot: &SourceSnapshot) -> EmitOutput;

    /// Parse-level diagnostics of one file.
    fn syntactic_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord>;

    /// Type-checker diagnostics of one file.
    fn semantic_diagnostics(&mut self, snapshot: &SourceSnapshot) -> Vec<DiagnosticRecord>;

    /// Diagnostics about the compiler options themselves.
    fn options_diagnostics(&mut self) -> Vec<DiagnosticRecord> {
        Vec::new()
    }
}
