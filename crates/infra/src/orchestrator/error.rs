use thiserror::Error;

use tally_accounting::{JournalError, LedgerError};
use tally_core::{Classify, DocumentId, ErrorKind, JournalEntryId, PartnerId, StoreError};
use tally_documents::DocumentError;
use tally_inventory::InventoryError;
use tally_parties::{PartnerError, PartnerKind};

/// Why an orchestrated operation did not take effect.
///
/// Every variant except [`Publish`](OperationError::Publish) means the unit was
/// discarded and nothing changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Partner(#[from] PartnerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("partner {partner_id} is not a {expected:?}")]
    WrongPartnerKind {
        partner_id: PartnerId,
        expected: PartnerKind,
    },

    #[error("journal entry {entry_id} belongs to document {document_id}")]
    LinkedEntry {
        entry_id: JournalEntryId,
        document_id: DocumentId,
    },

    #[error("event could not be encoded: {0}")]
    Event(String),

    #[error("operation cancelled before commit")]
    Cancelled,

    /// The unit committed; only the change notification was lost.
    #[error("committed, but publishing events failed: {0}")]
    Publish(String),
}

impl Classify for OperationError {
    fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Ledger(e) => e.kind(),
            OperationError::Journal(e) => e.kind(),
            OperationError::Inventory(e) => e.kind(),
            OperationError::Document(e) => e.kind(),
            OperationError::Partner(e) => e.kind(),
            OperationError::Store(e) => e.kind(),
            OperationError::WrongPartnerKind { .. } => ErrorKind::Validation,
            OperationError::LinkedEntry { .. } => ErrorKind::StateConflict,
            OperationError::Event(_) | OperationError::Publish(_) => ErrorKind::Fatal,
            OperationError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
