//! Business documents (sales and purchases) and their payment balances.
//!
//! Sale and purchase documents share one shape and one status machine; they
//! differ only in which side of the ledger their postings land on.

pub mod document;
pub mod error;
pub mod events;
pub mod query;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;

pub use document::{
    BusinessDocument, DocumentKind, DocumentNumbering, DocumentRows, DocumentStatus,
    DocumentTotals, LineAmounts, LineItem, NewDocument, PaymentRecord,
};
pub use error::DocumentError;
pub use events::{
    DocumentCancelled, DocumentCreated, DocumentDeleted, DocumentEvent, DocumentIssued,
    PaymentRecorded,
};
pub use query::{list_by_status, search};
pub use tracker::{BalanceTracker, PaymentOutcome, PaymentRequest};
