//! Transactional store boundary.
//!
//! Domain crates only know their row ports (`AccountRows`, `ItemRows`, ...).
//! A [`Store`] hands out units of work implementing all of them at once, and
//! either applies everything a unit wrote or nothing.

pub mod in_memory;

pub use in_memory::{InMemoryStore, InMemoryUnit};

use tally_accounting::{AccountRows, JournalRows};
use tally_core::{Sequences, StoreResult};
use tally_documents::DocumentRows;
use tally_inventory::ItemRows;
use tally_parties::PartnerRows;

/// Everything an operation can read or write inside one atomic unit.
pub trait UnitOfWork:
    AccountRows + JournalRows + ItemRows + DocumentRows + PartnerRows + Sequences
{
}

impl<T> UnitOfWork for T where
    T: AccountRows + JournalRows + ItemRows + DocumentRows + PartnerRows + Sequences + ?Sized
{
}

/// Source of atomic units of work.
///
/// ## Contract
///
/// - Reads made through a unit see the unit's own earlier writes.
/// - `commit` applies every buffered write of the unit, or none of them and
///   returns `StoreError::Conflict` when a row the unit read (or a unique key it
///   claims) changed since.
/// - Dropping a unit without committing discards it.
/// - `StoreError::Unavailable` is returned when the backing storage cannot be
///   reached; it is never retried.
pub trait Store: Send + Sync {
    type Unit: UnitOfWork;

    fn begin(&self) -> StoreResult<Self::Unit>;

    /// Commit a unit; returns the store-wide commit sequence it was given.
    fn commit(&self, unit: Self::Unit) -> StoreResult<u64>;
}

impl<S> Store for std::sync::Arc<S>
where
    S: Store + ?Sized,
{
    type Unit = S::Unit;

    fn begin(&self) -> StoreResult<Self::Unit> {
        (**self).begin()
    }

    fn commit(&self, unit: Self::Unit) -> StoreResult<u64> {
        (**self).commit(unit)
    }
}
