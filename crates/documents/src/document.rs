use core::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{
    AccountId, DocumentId, Entity, InventoryItemId, JournalEntryId, Money, PartnerId, Percent,
    StoreResult, ValueObject,
};
use tally_parties::OpenBalance;

use crate::error::DocumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sale,
    Purchase,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Sale => "sale",
            DocumentKind::Purchase => "purchase",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document lifecycle.
///
/// Statuses sit on tiers (`Draft` < issued < `PartiallyPaid` < `Paid`) and may
/// only move up. `Cancelled` is reachable from anything but `Paid` and is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Confirmed,
    Ordered,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl DocumentStatus {
    fn tier(self) -> Option<u8> {
        match self {
            DocumentStatus::Draft => Some(0),
            DocumentStatus::Pending | DocumentStatus::Confirmed | DocumentStatus::Ordered => Some(1),
            DocumentStatus::PartiallyPaid => Some(2),
            DocumentStatus::Paid => Some(3),
            DocumentStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Paid | DocumentStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.tier(), next.tier()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, _) => false,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One priced line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub tax_rate: Percent,
    #[serde(default)]
    pub discount_percent: Percent,
}

/// Rounded amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineAmounts {
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
    pub tax: Money,
}

impl LineItem {
    pub fn new(item_id: InventoryItemId, quantity: i64, unit_price: Money) -> Self {
        Self {
            item_id,
            quantity,
            unit_price,
            tax_rate: Percent::ZERO,
            discount_percent: Percent::ZERO,
        }
    }

    pub fn with_tax(mut self, rate: Percent) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn with_discount(mut self, percent: Percent) -> Self {
        self.discount_percent = percent;
        self
    }

    /// Gross, then discount on gross, then tax on the discounted net; each
    /// rounded to the minor unit.
    pub fn amounts(&self) -> Option<LineAmounts> {
        let gross = self.unit_price.checked_mul(self.quantity)?;
        let discount = gross.percent(self.discount_percent)?;
        let net = gross.checked_sub(discount)?;
        let tax = net.percent(self.tax_rate)?;
        Some(LineAmounts {
            gross,
            discount,
            net,
            tax,
        })
    }
}

impl ValueObject for LineItem {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub tax_total: Money,
    pub total: Money,
}

impl DocumentTotals {
    /// Validates every line and sums the rounded line amounts.
    pub fn compute(lines: &[LineItem]) -> Result<DocumentTotals, DocumentError> {
        if lines.is_empty() {
            return Err(DocumentError::EmptyDocument);
        }

        let mut totals = DocumentTotals::default();
        for (index, line) in lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DocumentError::InvalidLine {
                    index,
                    reason: format!("quantity must be positive, got {}", line.quantity),
                });
            }
            if line.unit_price.is_negative() {
                return Err(DocumentError::InvalidLine {
                    index,
                    reason: format!("unit price cannot be negative, got {}", line.unit_price),
                });
            }
            let a = line.amounts().ok_or(DocumentError::AmountOverflow)?;
            totals.subtotal = totals.subtotal.checked_add(a.gross).ok_or(DocumentError::AmountOverflow)?;
            totals.discount_total = totals
                .discount_total
                .checked_add(a.discount)
                .ok_or(DocumentError::AmountOverflow)?;
            totals.tax_total = totals.tax_total.checked_add(a.tax).ok_or(DocumentError::AmountOverflow)?;
        }
        totals.total = totals
            .subtotal
            .checked_sub(totals.discount_total)
            .and_then(|net| net.checked_add(totals.tax_total))
            .ok_or(DocumentError::AmountOverflow)?;
        Ok(totals)
    }

    /// Total before tax.
    pub fn net(&self) -> Money {
        self.subtotal - self.discount_total
    }
}

/// A payment applied to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Money,
    pub date: NaiveDate,
    pub settlement_account: AccountId,
    pub entry_id: JournalEntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A sale or purchase document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDocument {
    pub id: DocumentId,
    pub kind: DocumentKind,
    /// Unique per kind.
    pub number: String,
    pub partner_id: PartnerId,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub lines: Vec<LineItem>,
    #[serde(flatten)]
    pub totals: DocumentTotals,
    pub paid: Money,
    /// Entries posted when the document was issued.
    pub postings: Vec<JournalEntryId>,
    pub payments: Vec<PaymentRecord>,
    /// Stock was moved when the document was issued.
    #[serde(default)]
    pub stock_applied: bool,
    /// Set once revenue/cost and stock have been booked for the document.
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

impl BusinessDocument {
    /// A new `Draft` document with its totals computed.
    pub fn draft(new: NewDocument, number: String, now: DateTime<Utc>) -> Result<Self, DocumentError> {
        let number = number.trim().to_string();
        if number.is_empty() {
            return Err(DocumentError::InvalidDocument("number cannot be empty".to_string()));
        }
        if let Some(due) = new.due_date {
            if due < new.date {
                return Err(DocumentError::InvalidDocument(format!(
                    "due date {due} precedes document date {}",
                    new.date
                )));
            }
        }
        let totals = DocumentTotals::compute(&new.lines)?;

        Ok(Self {
            id: DocumentId::new(),
            kind: new.kind,
            number,
            partner_id: new.partner_id,
            date: new.date,
            due_date: new.due_date,
            status: DocumentStatus::Draft,
            lines: new.lines,
            totals,
            paid: Money::ZERO,
            postings: Vec::new(),
            payments: Vec::new(),
            stock_applied: false,
            issued_at: None,
            memo: new.memo,
            created_at: now,
        })
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn balance_amount(&self) -> Money {
        self.totals.total - self.paid
    }

    pub fn is_fully_paid(&self) -> bool {
        self.balance_amount().is_zero()
    }

    pub fn payment_by_reference(&self, reference: &str) -> Option<&PaymentRecord> {
        self.payments
            .iter()
            .find(|p| p.reference.as_deref() == Some(reference))
    }

    pub fn is_issued(&self) -> bool {
        self.issued_at.is_some()
    }

    /// Mark the document issued. A draft moves to `status`; a draft that
    /// already took payments keeps its payment status.
    pub fn issue(&mut self, status: DocumentStatus, at: DateTime<Utc>) -> Result<(), DocumentError> {
        let paid_draft = matches!(self.status, DocumentStatus::PartiallyPaid | DocumentStatus::Paid);
        if self.is_issued() || !(self.status == DocumentStatus::Draft || paid_draft) {
            return Err(DocumentError::InvalidTransition {
                document_id: self.id,
                from: self.status,
                to: status,
            });
        }
        if self.status == DocumentStatus::Draft {
            self.transition(status)?;
        }
        self.issued_at = Some(at);
        Ok(())
    }

    pub fn transition(&mut self, next: DocumentStatus) -> Result<(), DocumentError> {
        if !self.status.can_transition_to(next) {
            return Err(DocumentError::InvalidTransition {
                document_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Status the document would move to after paying `amount`, or why it can't.
    pub fn check_payment(&self, amount: Money) -> Result<DocumentStatus, DocumentError> {
        if !amount.is_positive() {
            return Err(DocumentError::InvalidAmount(amount));
        }
        if self.status == DocumentStatus::Cancelled {
            return Err(DocumentError::InvalidTransition {
                document_id: self.id,
                from: self.status,
                to: DocumentStatus::PartiallyPaid,
            });
        }
        let paid = self.paid.checked_add(amount).ok_or(DocumentError::AmountOverflow)?;
        if paid > self.totals.total {
            return Err(DocumentError::OverPayment {
                document_id: self.id,
                amount,
                balance: self.balance_amount(),
            });
        }
        Ok(if paid == self.totals.total {
            DocumentStatus::Paid
        } else {
            DocumentStatus::PartiallyPaid
        })
    }

    /// Apply a payment whose journal entry has been posted.
    pub fn register_payment(&mut self, payment: PaymentRecord) -> Result<(), DocumentError> {
        let next = self.check_payment(payment.amount)?;
        if next != self.status {
            self.transition(next)?;
        }
        self.paid += payment.amount;
        self.payments.push(payment);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DocumentError> {
        if self.paid.is_positive() {
            return Err(DocumentError::CannotCancelWithPayments {
                document_id: self.id,
                paid: self.paid,
            });
        }
        self.transition(DocumentStatus::Cancelled)
    }

    /// Every journal entry linked to this document: postings, then payments.
    pub fn linked_entries(&self) -> impl Iterator<Item = JournalEntryId> + '_ {
        self.postings
            .iter()
            .copied()
            .chain(self.payments.iter().map(|p| p.entry_id))
    }
}

impl Entity for BusinessDocument {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn natural_key(&self) -> Option<String> {
        Some(format!("{}:{}", self.kind, self.number))
    }
}

impl OpenBalance for BusinessDocument {
    fn partner_id(&self) -> PartnerId {
        self.partner_id
    }

    fn open_balance(&self) -> Money {
        if self.status == DocumentStatus::Cancelled {
            Money::ZERO
        } else {
            self.balance_amount()
        }
    }
}

/// Input for a new document. `number` is client-generated when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub kind: DocumentKind,
    #[serde(default)]
    pub number: Option<String>,
    pub partner_id: PartnerId,
    pub date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<LineItem>,
    #[serde(default)]
    pub memo: String,
}

impl NewDocument {
    pub fn new(kind: DocumentKind, partner_id: PartnerId, date: NaiveDate) -> Self {
        Self {
            kind,
            number: None,
            partner_id,
            date,
            due_date: None,
            lines: Vec::new(),
            memo: String::new(),
        }
    }

    pub fn numbered(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

/// Prefixes used when a document arrives without a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentNumbering {
    pub sale_prefix: String,
    pub purchase_prefix: String,
    pub width: usize,
}

impl Default for DocumentNumbering {
    fn default() -> Self {
        Self {
            sale_prefix: "INV".to_string(),
            purchase_prefix: "PUR".to_string(),
            width: 6,
        }
    }
}

impl DocumentNumbering {
    pub fn prefix(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::Sale => &self.sale_prefix,
            DocumentKind::Purchase => &self.purchase_prefix,
        }
    }

    pub fn series(&self, kind: DocumentKind) -> String {
        format!("document:{}:{}", kind, self.prefix(kind))
    }
}

/// Persistence port for documents.
pub trait DocumentRows {
    fn document(&mut self, id: DocumentId) -> StoreResult<Option<BusinessDocument>>;

    fn document_by_number(&mut self, kind: DocumentKind, number: &str) -> StoreResult<Option<BusinessDocument>>;

    /// Every document, in no particular order.
    fn documents(&mut self) -> StoreResult<Vec<BusinessDocument>>;

    /// Insert or replace.
    fn save_document(&mut self, document: BusinessDocument) -> StoreResult<()>;

    fn remove_document(&mut self, id: DocumentId) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cents(v: i64) -> Money {
        Money::from_minor(v)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()
    }

    fn sale(lines: Vec<LineItem>) -> BusinessDocument {
        let mut new = NewDocument::new(DocumentKind::Sale, PartnerId::new(), date());
        new.lines = lines;
        BusinessDocument::draft(new, "INV-1".to_string(), Utc::now()).unwrap()
    }

    fn payment(amount: i64) -> PaymentRecord {
        PaymentRecord {
            amount: cents(amount),
            date: date(),
            settlement_account: AccountId::new(),
            entry_id: JournalEntryId::new(),
            reference: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn discount_applies_before_tax() {
        let line = LineItem::new(InventoryItemId::new(), 3, cents(1_999))
            .with_discount(Percent::new(dec!(10)).unwrap())
            .with_tax(Percent::new(dec!(7.5)).unwrap());

        // gross 59.97, discount 6.00 (5.997), net 53.97, tax 4.05 (4.04775)
        let a = line.amounts().unwrap();
        assert_eq!(a.gross, cents(5_997));
        assert_eq!(a.discount, cents(600));
        assert_eq!(a.net, cents(5_397));
        assert_eq!(a.tax, cents(405));

        let totals = DocumentTotals::compute(&[line]).unwrap();
        assert_eq!(totals.total, cents(5_802));
        assert_eq!(totals.net(), cents(5_397));
    }

    #[test]
    fn lines_must_be_positive() {
        let err = DocumentTotals::compute(&[LineItem::new(InventoryItemId::new(), 0, cents(1))]).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidLine { index: 0, .. }));
        assert_eq!(DocumentTotals::compute(&[]).unwrap_err(), DocumentError::EmptyDocument);
    }

    #[test]
    fn payments_walk_the_status_up() {
        // 1000.00 sale, paid 400 then 600, then 0.01 too much.
        let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(100_000))]);
        assert_eq!(doc.status, DocumentStatus::Draft);

        doc.register_payment(payment(40_000)).unwrap();
        assert_eq!(doc.paid, cents(40_000));
        assert_eq!(doc.status, DocumentStatus::PartiallyPaid);

        doc.register_payment(payment(60_000)).unwrap();
        assert_eq!(doc.paid, cents(100_000));
        assert_eq!(doc.status, DocumentStatus::Paid);
        assert!(doc.is_fully_paid());

        let err = doc.register_payment(payment(1)).unwrap_err();
        assert!(matches!(err, DocumentError::OverPayment { balance, .. } if balance == Money::ZERO));
        assert_eq!(doc.paid, cents(100_000));
        assert_eq!(doc.payments.len(), 2);
    }

    #[test]
    fn non_positive_payments_are_invalid() {
        let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(500))]);
        assert_eq!(
            doc.register_payment(payment(0)).unwrap_err(),
            DocumentError::InvalidAmount(Money::ZERO)
        );
    }

    #[test]
    fn statuses_only_move_up() {
        use DocumentStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(PartiallyPaid));
        assert!(!Pending.can_transition_to(Confirmed));
        assert!(!PartiallyPaid.can_transition_to(Pending));
        assert!(PartiallyPaid.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Draft));
    }

    #[test]
    fn cancelling_requires_no_payments() {
        let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(500))]);
        doc.register_payment(payment(100)).unwrap();
        assert!(matches!(doc.cancel(), Err(DocumentError::CannotCancelWithPayments { .. })));

        let mut fresh = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(500))]);
        fresh.cancel().unwrap();
        assert_eq!(fresh.open_balance(), Money::ZERO);
        assert!(matches!(
            fresh.register_payment(payment(1)),
            Err(DocumentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn paid_drafts_are_issued_without_losing_their_status() {
        let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 2, cents(1_000))]);
        doc.register_payment(payment(500)).unwrap();
        assert_eq!(doc.status, DocumentStatus::PartiallyPaid);

        doc.issue(DocumentStatus::Pending, Utc::now()).unwrap();
        assert_eq!(doc.status, DocumentStatus::PartiallyPaid);
        assert!(doc.is_issued());

        assert!(matches!(
            doc.issue(DocumentStatus::Pending, Utc::now()),
            Err(DocumentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn cancelled_drafts_cannot_be_issued() {
        let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(1_000))]);
        doc.cancel().unwrap();
        assert!(doc.issue(DocumentStatus::Pending, Utc::now()).is_err());
        assert!(!doc.is_issued());
    }

    proptest::proptest! {
        /// Whatever sequence of payments is attempted, paid never exceeds the
        /// total and a refused payment leaves the document unchanged.
        #[test]
        fn paid_never_exceeds_total(
            total in 1i64..100_000,
            amounts in proptest::collection::vec(1i64..60_000, 1..12),
        ) {
            let mut doc = sale(vec![LineItem::new(InventoryItemId::new(), 1, cents(total))]);
            for amount in amounts {
                let before = doc.clone();
                match doc.register_payment(payment(amount)) {
                    Ok(()) => proptest::prop_assert!(doc.paid <= doc.total()),
                    Err(DocumentError::OverPayment { .. }) => {
                        proptest::prop_assert_eq!(&doc, &before);
                        proptest::prop_assert!(before.paid + cents(amount) > before.total());
                    }
                    Err(other) => proptest::prop_assert!(false, "unexpected {:?}", other),
                }
            }
            let expected = if doc.paid == doc.total() {
                DocumentStatus::Paid
            } else if doc.paid.is_positive() {
                DocumentStatus::PartiallyPaid
            } else {
                DocumentStatus::Draft
            };
            proptest::prop_assert_eq!(doc.status, expected);
        }
    }
}
