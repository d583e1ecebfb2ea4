//! Sequence port: gap-free counters used for human-readable numbers.

use crate::error::StoreResult;

/// Source of monotonically increasing counters, one per named series.
///
/// Implemented by a store's unit of work so that taking a number is part of the
/// same atomic unit as the row that uses it: an aborted unit never burns one.
pub trait Sequences {
    /// Advance `series` and return the new value (first value is `1`).
    fn next_value(&mut self, series: &str) -> StoreResult<u64>;
}

/// `<PREFIX>-<zero-padded value>`, e.g. `JE-000042`.
pub fn format_number(prefix: &str, value: u64, width: usize) -> String {
    format!("{prefix}-{value:0width$}")
}
