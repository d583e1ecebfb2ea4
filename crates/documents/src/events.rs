use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{DocumentId, JournalEntryId, Money, PartnerId};
use tally_events::Event;

use crate::document::{BusinessDocument, DocumentKind, DocumentStatus, PaymentRecord};

/// Event: DocumentCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub partner_id: PartnerId,
    pub status: DocumentStatus,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub document_id: DocumentId,
    pub amount: Money,
    pub paid: Money,
    pub balance: Money,
    pub status: DocumentStatus,
    pub entry_id: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentCancelled.
/// Event: DocumentIssued (a draft left `Draft` and was posted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIssued {
    pub document_id: DocumentId,
    pub number: String,
    pub status: DocumentStatus,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCancelled {
    pub document_id: DocumentId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeleted {
    pub document_id: DocumentId,
    pub kind: DocumentKind,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    DocumentCreated(DocumentCreated),
    DocumentIssued(DocumentIssued),
    PaymentRecorded(PaymentRecorded),
    DocumentCancelled(DocumentCancelled),
    DocumentDeleted(DocumentDeleted),
}

impl DocumentEvent {
    pub fn created(doc: &BusinessDocument, occurred_at: DateTime<Utc>) -> Self {
        DocumentEvent::DocumentCreated(DocumentCreated {
            document_id: doc.id,
            kind: doc.kind,
            number: doc.number.clone(),
            partner_id: doc.partner_id,
            status: doc.status,
            total: doc.total(),
            occurred_at,
        })
    }

    pub fn issued(doc: &BusinessDocument, occurred_at: DateTime<Utc>) -> Self {
        DocumentEvent::DocumentIssued(DocumentIssued {
            document_id: doc.id,
            number: doc.number.clone(),
            status: doc.status,
            total: doc.total(),
            occurred_at,
        })
    }

    pub fn payment_recorded(doc: &BusinessDocument, payment: &PaymentRecord, occurred_at: DateTime<Utc>) -> Self {
        DocumentEvent::PaymentRecorded(PaymentRecorded {
            document_id: doc.id,
            amount: payment.amount,
            paid: doc.paid,
            balance: doc.balance_amount(),
            status: doc.status,
            entry_id: payment.entry_id,
            occurred_at,
        })
    }

    pub fn cancelled(doc: &BusinessDocument, occurred_at: DateTime<Utc>) -> Self {
        DocumentEvent::DocumentCancelled(DocumentCancelled {
            document_id: doc.id,
            number: doc.number.clone(),
            occurred_at,
        })
    }

    pub fn deleted(doc: &BusinessDocument, occurred_at: DateTime<Utc>) -> Self {
        DocumentEvent::DocumentDeleted(DocumentDeleted {
            document_id: doc.id,
            kind: doc.kind,
            number: doc.number.clone(),
            occurred_at,
        })
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            DocumentEvent::DocumentCreated(e) => e.document_id,
            DocumentEvent::DocumentIssued(e) => e.document_id,
            DocumentEvent::PaymentRecorded(e) => e.document_id,
            DocumentEvent::DocumentCancelled(e) => e.document_id,
            DocumentEvent::DocumentDeleted(e) => e.document_id,
        }
    }
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::DocumentCreated(_) => "documents.document.created",
            DocumentEvent::DocumentIssued(_) => "documents.document.issued",
            DocumentEvent::PaymentRecorded(_) => "documents.document.payment_recorded",
            DocumentEvent::DocumentCancelled(_) => "documents.document.cancelled",
            DocumentEvent::DocumentDeleted(_) => "documents.document.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::DocumentCreated(e) => e.occurred_at,
            DocumentEvent::DocumentIssued(e) => e.occurred_at,
            DocumentEvent::PaymentRecorded(e) => e.occurred_at,
            DocumentEvent::DocumentCancelled(e) => e.occurred_at,
            DocumentEvent::DocumentDeleted(e) => e.occurred_at,
        }
    }
}
