use thiserror::Error;

use tally_accounting::JournalError;
use tally_core::{Classify, DocumentId, ErrorKind, Money, StoreError};
use tally_parties::PartnerError;

use crate::document::{DocumentKind, DocumentStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document has no lines")]
    EmptyDocument,

    #[error("line {index} is invalid: {reason}")]
    InvalidLine { index: usize, reason: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("payment amount must be positive, got {0}")]
    InvalidAmount(Money),

    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),

    #[error("{kind} document number '{number}' already exists")]
    DuplicateNumber { kind: DocumentKind, number: String },

    #[error("payment of {amount} exceeds the open balance {balance} of document {document_id}")]
    OverPayment {
        document_id: DocumentId,
        amount: Money,
        balance: Money,
    },

    #[error("document {document_id} cannot move from {from} to {to}")]
    InvalidTransition {
        document_id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error("document {document_id} has {paid} in payments; reverse them before cancelling")]
    CannotCancelWithPayments { document_id: DocumentId, paid: Money },

    #[error("document {document_id} is {status}, only drafts can be deleted")]
    NotDraft {
        document_id: DocumentId,
        status: DocumentStatus,
    },

    #[error("amount overflow")]
    AmountOverflow,

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Partner(#[from] PartnerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for DocumentError {
    fn kind(&self) -> ErrorKind {
        match self {
            DocumentError::EmptyDocument
            | DocumentError::InvalidLine { .. }
            | DocumentError::InvalidDocument(_)
            | DocumentError::InvalidAmount(_)
            | DocumentError::DuplicateNumber { .. }
            | DocumentError::AmountOverflow => ErrorKind::Validation,
            DocumentError::DocumentNotFound(_)
            | DocumentError::OverPayment { .. }
            | DocumentError::InvalidTransition { .. }
            | DocumentError::CannotCancelWithPayments { .. }
            | DocumentError::NotDraft { .. } => ErrorKind::StateConflict,
            DocumentError::Journal(e) => e.kind(),
            DocumentError::Partner(e) => e.kind(),
            DocumentError::Store(e) => e.kind(),
        }
    }
}
