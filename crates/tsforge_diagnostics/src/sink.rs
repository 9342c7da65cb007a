//! Collector for diagnostics reported during a build session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::record::DiagnosticRecord;
use crate::severity::Severity;

/// Receives every diagnostic the driver decides to report, in report order.
///
/// Per-severity counts are kept in atomics so callers can ask whether the
/// build had errors without taking the lock. Counts are cumulative and are
/// not reset by [`take_all`](Self::take_all).
pub struct DiagnosticSink {
    reported: Mutex<Vec<DiagnosticRecord>>,
    counts: [AtomicUsize; 4],
}

impl DiagnosticSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self {
            reported: Mutex::new(Vec::new()),
            counts: Default::default(),
        }
    }

    fn reported(&self) -> MutexGuard<'_, Vec<DiagnosticRecord>> {
        self.reported.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports one diagnostic.
    pub fn emit(&self, diag: DiagnosticRecord) {
        self.counts[diag.severity as usize].fetch_add(1, Ordering::Relaxed);
        self.reported().push(diag);
    }

    /// Reports several diagnostics, keeping their order.
    pub fn emit_all(&self, diags: impl IntoIterator<Item = DiagnosticRecord>) {
        let mut reported = self.reported();
        for diag in diags {
            self.counts[diag.severity as usize].fetch_add(1, Ordering::Relaxed);
            reported.push(diag);
        }
    }

    /// Number of diagnostics of `severity` reported so far.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity as usize].load(Ordering::Relaxed)
    }

    /// Number of errors reported so far.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Returns `true` once any error has been reported.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Drains the reported diagnostics, e.g. after printing them.
    pub fn take_all(&self) -> Vec<DiagnosticRecord> {
        std::mem::take(&mut *self.reported())
    }

    /// Snapshot of the reported diagnostics.
    pub fn diagnostics(&self) -> Vec<DiagnosticRecord> {
        self.reported().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
