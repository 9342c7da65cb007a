//! The contract for filling the cache on a miss.

/// A deterministic computation that produces a cacheable value.
///
/// Implementations must be pure with respect to their inputs: given the same
/// snapshot text and configuration they must return the same value, and
/// they must have no side effects beyond producing it. The cache relies on
/// this to reuse a result for every later request with the same key.
///
/// Any `FnOnce() -> T` closure is a `Computable<T>`.
pub trait Computable<T> {
    /// Runs the computation.
    fn compute(self) -> T;
}

impl<T, F> Computable<T> for F
where
    F: FnOnce() -> T,
{
    fn compute(self) -> T {
        self()
    }
}
