use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_accounting::{
    AccountRows, JournalEntry, JournalLine, JournalRows, NewJournalEntry, PostingEngine,
};
use tally_core::{AccountId, DocumentId, Money, Sequences};
use tally_parties::{PartnerRegistry, PartnerRows};

use crate::document::{BusinessDocument, DocumentKind, DocumentRows, PaymentRecord};
use crate::error::DocumentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub document_id: DocumentId,
    pub amount: Money,
    /// Cash or bank account the money moves through.
    pub settlement_account: AccountId,
    pub date: NaiveDate,
    /// Caller key; a repeated reference returns the recorded payment.
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentRequest {
    pub fn new(document_id: DocumentId, amount: Money, settlement_account: AccountId, date: NaiveDate) -> Self {
        Self {
            document_id,
            amount,
            settlement_account,
            date,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub document: BusinessDocument,
    pub payment: PaymentRecord,
    pub entry: JournalEntry,
    /// The reference had been seen before; nothing was posted.
    pub replayed: bool,
}

impl PaymentOutcome {
    pub fn balance(&self) -> Money {
        self.document.balance_amount()
    }
}

/// Keeps document paid amounts and the ledger in step.
#[derive(Debug, Clone, Default)]
pub struct BalanceTracker {
    engine: PostingEngine,
    partners: PartnerRegistry,
}

impl BalanceTracker {
    pub fn new(engine: PostingEngine, partners: PartnerRegistry) -> Self {
        Self { engine, partners }
    }

    pub fn engine(&self) -> &PostingEngine {
        &self.engine
    }

    pub fn document<R>(&self, rows: &mut R, id: DocumentId) -> Result<BusinessDocument, DocumentError>
    where
        R: DocumentRows + ?Sized,
    {
        rows.document(id)?.ok_or(DocumentError::DocumentNotFound(id))
    }

    /// Record a payment and post its settlement entry.
    ///
    /// Sales debit the settlement account and credit the customer's
    /// receivable; purchases debit the vendor's payable and credit the
    /// settlement account.
    pub fn apply_payment<R>(
        &self,
        rows: &mut R,
        request: PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, DocumentError>
    where
        R: DocumentRows + PartnerRows + AccountRows + JournalRows + Sequences + ?Sized,
    {
        if !request.amount.is_positive() {
            return Err(DocumentError::InvalidAmount(request.amount));
        }
        let mut document = self.document(rows, request.document_id)?;

        if let Some(reference) = request.reference.as_deref() {
            if let Some(payment) = document.payment_by_reference(reference).cloned() {
                let entry = self.engine.entry(rows, payment.entry_id)?;
                debug!(document_id = %document.id, reference, "payment replayed");
                return Ok(PaymentOutcome {
                    document,
                    payment,
                    entry,
                    replayed: true,
                });
            }
        }

        document.check_payment(request.amount)?;
        let partner = self.partners.partner(rows, document.partner_id)?;

        let (debit, credit) = match document.kind {
            DocumentKind::Sale => (request.settlement_account, partner.account_id),
            DocumentKind::Purchase => (partner.account_id, request.settlement_account),
        };
        let entry = self.engine.post(
            rows,
            NewJournalEntry::new(request.date, format!("Payment for {}", document.number))
                .line(JournalLine::debit(debit, request.amount))
                .line(JournalLine::credit(credit, request.amount)),
            now,
        )?;

        let payment = PaymentRecord {
            amount: request.amount,
            date: request.date,
            settlement_account: request.settlement_account,
            entry_id: entry.id,
            reference: request.reference,
            recorded_at: now,
        };
        document.register_payment(payment.clone())?;
        rows.save_document(document.clone())?;

        debug!(
            document_id = %document.id,
            amount = %payment.amount,
            paid = %document.paid,
            status = %document.status,
            "payment applied"
        );
        Ok(PaymentOutcome {
            document,
            payment,
            entry,
            replayed: false,
        })
    }

    /// Reverse every linked entry that is not reversed yet.
    pub fn reverse_postings<R>(
        &self,
        rows: &mut R,
        document: &BusinessDocument,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<JournalEntry>, DocumentError>
    where
        R: AccountRows + JournalRows + Sequences + ?Sized,
    {
        let mut reversals = Vec::new();
        for entry_id in document.linked_entries() {
            if self.engine.entry(rows, entry_id)?.is_reversed() {
                continue;
            }
            reversals.push(self.engine.reverse(rows, entry_id, date, now)?);
        }
        Ok(reversals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentStatus, LineItem, NewDocument};
    use crate::testing::MemoryRows;
    use tally_accounting::{AccountType, LedgerStore, NewAccount};
    use tally_core::InventoryItemId;
    use tally_parties::NewPartner;

    fn cents(v: i64) -> Money {
        Money::from_minor(v)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    struct Books {
        rows: MemoryRows,
        cash: AccountId,
        control: AccountId,
    }

    fn books(kind: DocumentKind, total: i64) -> (Books, DocumentId) {
        let mut rows = MemoryRows::default();
        let cash = LedgerStore
            .create_account(&mut rows, NewAccount::new("1000", "Cash", AccountType::Asset), Utc::now())
            .unwrap()
            .id;
        let (control, new_partner) = match kind {
            DocumentKind::Sale => {
                let id = LedgerStore
                    .create_account(&mut rows, NewAccount::new("1200", "AR", AccountType::Asset), Utc::now())
                    .unwrap()
                    .id;
                (id, NewPartner::customer("Acme", id))
            }
            DocumentKind::Purchase => {
                let id = LedgerStore
                    .create_account(&mut rows, NewAccount::new("2000", "AP", AccountType::Liability), Utc::now())
                    .unwrap()
                    .id;
                (id, NewPartner::vendor("Supplies Ltd", id))
            }
        };
        let partner = PartnerRegistry::default()
            .register(&mut rows, new_partner, Utc::now())
            .unwrap();

        let doc = BusinessDocument::draft(
            NewDocument::new(kind, partner.id, date())
                .line(LineItem::new(InventoryItemId::new(), 1, cents(total))),
            "DOC-1".to_string(),
            Utc::now(),
        )
        .unwrap();
        let id = doc.id;
        rows.save_document(doc).unwrap();
        (Books { rows, cash, control }, id)
    }

    fn balance(rows: &mut MemoryRows, id: AccountId) -> Money {
        LedgerStore.get_balance(rows, id).unwrap()
    }

    #[test]
    fn sale_payments_settle_the_receivable() {
        let (mut b, doc) = books(DocumentKind::Sale, 100_000);
        let tracker = BalanceTracker::default();

        let first = tracker
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(40_000), b.cash, date()), Utc::now())
            .unwrap();
        assert_eq!(first.document.status, DocumentStatus::PartiallyPaid);
        assert_eq!(first.balance(), cents(60_000));

        let second = tracker
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(60_000), b.cash, date()), Utc::now())
            .unwrap();
        assert_eq!(second.document.status, DocumentStatus::Paid);
        assert_eq!(second.document.paid, cents(100_000));

        let err = tracker
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(1), b.cash, date()), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DocumentError::OverPayment { .. }));

        assert_eq!(balance(&mut b.rows, b.cash), cents(100_000));
        assert_eq!(balance(&mut b.rows, b.control), cents(-100_000));
    }

    #[test]
    fn purchase_payments_reduce_the_payable() {
        let (mut b, doc) = books(DocumentKind::Purchase, 5_000);
        let outcome = BalanceTracker::default()
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(2_000), b.cash, date()), Utc::now())
            .unwrap();

        assert_eq!(outcome.entry.lines[0].account_id, b.control);
        assert_eq!(balance(&mut b.rows, b.cash), cents(-2_000));
        assert_eq!(balance(&mut b.rows, b.control), cents(-2_000));
    }

    #[test]
    fn repeated_references_do_not_post_twice() {
        let (mut b, doc) = books(DocumentKind::Sale, 10_000);
        let tracker = BalanceTracker::default();
        let request = PaymentRequest::new(doc, cents(2_500), b.cash, date()).with_reference("bank-tx-17");

        let first = tracker.apply_payment(&mut b.rows, request.clone(), Utc::now()).unwrap();
        let again = tracker.apply_payment(&mut b.rows, request, Utc::now()).unwrap();

        assert!(!first.replayed);
        assert!(again.replayed);
        assert_eq!(again.entry.id, first.entry.id);
        assert_eq!(again.document.paid, cents(2_500));
        assert_eq!(balance(&mut b.rows, b.cash), cents(2_500));
    }

    #[test]
    fn rejected_payments_leave_no_trace() {
        let (mut b, doc) = books(DocumentKind::Sale, 1_000);
        let tracker = BalanceTracker::default();

        let err = tracker
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(1_001), b.cash, date()), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::OverPayment {
                document_id: doc,
                amount: cents(1_001),
                balance: cents(1_000)
            }
        );
        assert_eq!(
            tracker
                .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(-1), b.cash, date()), Utc::now())
                .unwrap_err(),
            DocumentError::InvalidAmount(cents(-1))
        );
        let missing = DocumentId::new();
        assert_eq!(
            tracker
                .apply_payment(&mut b.rows, PaymentRequest::new(missing, cents(1), b.cash, date()), Utc::now())
                .unwrap_err(),
            DocumentError::DocumentNotFound(missing)
        );

        assert_eq!(balance(&mut b.rows, b.cash), Money::ZERO);
        assert_eq!(tracker.document(&mut b.rows, doc).unwrap().paid, Money::ZERO);
    }

    #[test]
    fn linked_entries_are_reversed_once() {
        let (mut b, doc) = books(DocumentKind::Sale, 1_000);
        let tracker = BalanceTracker::default();
        tracker
            .apply_payment(&mut b.rows, PaymentRequest::new(doc, cents(300), b.cash, date()), Utc::now())
            .unwrap();
        let document = tracker.document(&mut b.rows, doc).unwrap();

        let reversed = tracker.reverse_postings(&mut b.rows, &document, date(), Utc::now()).unwrap();
        assert_eq!(reversed.len(), 1);
        assert_eq!(balance(&mut b.rows, b.cash), Money::ZERO);

        let again = tracker.reverse_postings(&mut b.rows, &document, date(), Utc::now()).unwrap();
        assert!(again.is_empty());
    }
}
