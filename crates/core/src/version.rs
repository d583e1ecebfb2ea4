//! Row versions for optimistic concurrency.

use crate::error::{StoreError, StoreResult};

/// Version a unit of work expects a row to still have at commit time.
///
/// Version `0` means "the row did not exist when it was read".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (blind writes of freshly generated ids).
    Any,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, what: impl core::fmt::Display, actual: u64) -> StoreResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(StoreError::conflict(format!(
                "{what} changed concurrently (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
