//! Accounting module: chart of accounts, running balances and double-entry
//! posting.
//!
//! Pure domain logic only. Persistence is reached through the [`AccountRows`] and
//! [`JournalRows`] ports, which a store implements on its unit of work; every
//! call made here therefore lands in the caller's atomic unit.

pub mod account;
pub mod chart;
pub mod error;
pub mod events;
pub mod journal;
pub mod ledger;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{Account, AccountType, NewAccount, Side};
pub use chart::{AccountTemplate, DEFAULT_CHART};
pub use error::{JournalError, LedgerError};
pub use events::{AccountCreated, AccountDeactivated, EntryDeleted, EntryPosted, EntryUpdated, LedgerEvent};
pub use journal::{
    EntryNumbering, JournalEntry, JournalLine, JournalRows, LineTotals, NewJournalEntry,
    PostingEngine,
};
pub use ledger::{AccountRows, LedgerStore};
