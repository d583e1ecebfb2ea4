//! The named operations.
//!
//! Each struct is the full input of one atomic change. Document-creating
//! operations are idempotent on the client-supplied document number.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_accounting::{
    Account, AccountTemplate, DEFAULT_CHART, JournalEntry, JournalLine, LedgerEvent, NewAccount,
    NewJournalEntry,
};
use tally_core::{
    AccountId, DocumentId, InventoryItemId, JournalEntryId, Money, PartnerId, format_number,
};
use tally_documents::{
    BusinessDocument, DocumentError, DocumentEvent, DocumentKind, DocumentStatus, NewDocument,
    PaymentOutcome, PaymentRequest,
};
use tally_inventory::{InventoryError, InventoryItem, NewItem, StockEvent, StockLine};
use tally_parties::{BusinessPartner, NewPartner, PartnerEvent, PartnerKind};

use super::{Operation, OperationError, UnitContext};
use crate::store::UnitOfWork;

const ACCOUNT: &str = "account";
const JOURNAL_ENTRY: &str = "journal_entry";
const INVENTORY_ITEM: &str = "inventory_item";
const PARTNER: &str = "partner";
const DOCUMENT: &str = "document";

/// Result of a document-creating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReceipt {
    pub document: BusinessDocument,
    /// The number already existed; the stored document is returned untouched.
    pub replayed: bool,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount(pub NewAccount);

impl Operation for CreateAccount {
    const NAME: &'static str = "create_account";
    type Output = Account;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<Account, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let account = ctx
            .services
            .ledger
            .create_account(&mut *ctx.unit, self.0.clone(), ctx.now)?;
        ctx.emit(ACCOUNT, account.id, &LedgerEvent::account_created(&account, ctx.now))?;
        Ok(account)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateAccount {
    pub account_id: AccountId,
}

impl Operation for DeactivateAccount {
    const NAME: &'static str = "deactivate_account";
    type Output = Account;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<Account, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let account = ctx
            .services
            .ledger
            .deactivate_account(&mut *ctx.unit, self.account_id)?;
        ctx.emit(ACCOUNT, account.id, &LedgerEvent::account_deactivated(&account, ctx.now))?;
        Ok(account)
    }
}

/// Seed a chart of accounts; codes that already exist are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeChart {
    pub templates: &'static [AccountTemplate],
}

impl Default for InitializeChart {
    fn default() -> Self {
        Self {
            templates: DEFAULT_CHART,
        }
    }
}

impl Operation for InitializeChart {
    const NAME: &'static str = "initialize_chart";
    type Output = Vec<Account>;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<Vec<Account>, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let created = ctx
            .services
            .ledger
            .initialize_chart(&mut *ctx.unit, self.templates, ctx.now)?;
        for account in &created {
            ctx.emit(ACCOUNT, account.id, &LedgerEvent::account_created(account, ctx.now))?;
        }
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalEntry(pub NewJournalEntry);

impl Operation for PostJournalEntry {
    const NAME: &'static str = "post_journal_entry";
    type Output = JournalEntry;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<JournalEntry, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let entry = ctx
            .services
            .engine
            .post(&mut *ctx.unit, self.0.clone(), ctx.now)?;
        ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_posted(&entry, ctx.now))?;
        Ok(entry)
    }
}

/// Post the mirror image of an entry, dated `date` (today when absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseJournalEntry {
    pub entry_id: JournalEntryId,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Operation for ReverseJournalEntry {
    const NAME: &'static str = "reverse_journal_entry";
    type Output = JournalEntry;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<JournalEntry, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let date = self.date.unwrap_or_else(|| ctx.today());
        let reversal = ctx
            .services
            .engine
            .reverse(&mut *ctx.unit, self.entry_id, date, ctx.now)?;
        ctx.emit(JOURNAL_ENTRY, reversal.id, &LedgerEvent::entry_posted(&reversal, ctx.now))?;
        Ok(reversal)
    }
}

/// Replace the lines of a manual entry. Document postings are off limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateJournalEntry {
    pub entry_id: JournalEntryId,
    pub lines: Vec<JournalLine>,
    #[serde(default)]
    pub memo: Option<String>,
}

impl Operation for UpdateJournalEntry {
    const NAME: &'static str = "update_journal_entry";
    type Output = JournalEntry;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<JournalEntry, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        ensure_unlinked(ctx, self.entry_id)?;
        let entry = ctx.services.engine.update(
            &mut *ctx.unit,
            self.entry_id,
            self.lines.clone(),
            self.memo.clone(),
        )?;
        ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_updated(&entry, ctx.now))?;
        Ok(entry)
    }
}

/// Remove a manual entry and back out its balance effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteJournalEntry {
    pub entry_id: JournalEntryId,
}

impl Operation for DeleteJournalEntry {
    const NAME: &'static str = "delete_journal_entry";
    type Output = JournalEntry;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<JournalEntry, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        ensure_unlinked(ctx, self.entry_id)?;
        let entry = ctx.services.engine.delete(&mut *ctx.unit, self.entry_id)?;
        ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_deleted(&entry, ctx.now))?;
        Ok(entry)
    }
}

/// Entries posted for a document (or reversing one) only change through the
/// document's own operations.
fn ensure_unlinked<U>(ctx: &mut UnitContext<'_, U>, entry_id: JournalEntryId) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    let entry = ctx.services.engine.entry(&mut *ctx.unit, entry_id)?;
    let related: Vec<JournalEntryId> = std::iter::once(entry.id).chain(entry.reverses).collect();

    for document in ctx.unit.documents()? {
        if document.linked_entries().any(|id| related.contains(&id)) {
            return Err(OperationError::LinkedEntry {
                entry_id,
                document_id: document.id,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Items and partners
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInventoryItem(pub NewItem);

impl Operation for CreateInventoryItem {
    const NAME: &'static str = "create_inventory_item";
    type Output = InventoryItem;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<InventoryItem, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let services = ctx.services;
        let (now, today) = (ctx.now, ctx.today());

        let item = services.guard.create_item(&mut *ctx.unit, self.0.clone(), now)?;
        ctx.emit(INVENTORY_ITEM, item.id, &StockEvent::item_created(&item, now))?;

        // Opening stock is carried at cost against owner's equity.
        let value = item
            .cost_of(item.available_quantity)
            .ok_or(InventoryError::AmountOverflow)?;
        if value.is_positive() {
            let equity = services
                .ledger
                .account_by_code(&mut *ctx.unit, &services.roles.opening_equity)?;
            let mut lines = services.guard.inventory_debits(&mut *ctx.unit, &[(item.id, value)])?;
            lines.push(JournalLine::credit(equity.id, value));

            let new = lines.into_iter().fold(
                NewJournalEntry::new(today, format!("Opening stock {}", item.sku)),
                NewJournalEntry::line,
            );
            let entry = services.engine.post(&mut *ctx.unit, new, now)?;
            ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_posted(&entry, now))?;
        }
        Ok(item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPartner(pub NewPartner);

impl Operation for RegisterPartner {
    const NAME: &'static str = "register_partner";
    type Output = BusinessPartner;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<BusinessPartner, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let partner = ctx
            .services
            .partners
            .register(&mut *ctx.unit, self.0.clone(), ctx.now)?;
        ctx.emit(PARTNER, partner.id, &PartnerEvent::registered(&partner, ctx.now))?;
        Ok(partner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivatePartner {
    pub partner_id: PartnerId,
}

impl Operation for DeactivatePartner {
    const NAME: &'static str = "deactivate_partner";
    type Output = BusinessPartner;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<BusinessPartner, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let documents = ctx.unit.documents()?;
        let partner = ctx
            .services
            .partners
            .deactivate(&mut *ctx.unit, self.partner_id, &documents)?;
        ctx.emit(PARTNER, partner.id, &PartnerEvent::deactivated(&partner, ctx.now))?;
        Ok(partner)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Save a new document in `Draft`. Nothing is posted and no stock moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftDocument(pub NewDocument);

impl Operation for CreateDraftDocument {
    const NAME: &'static str = "create_draft_document";
    type Output = DocumentReceipt;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<DocumentReceipt, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let document = match prepare(ctx, &self.0, false)? {
            Prepared::Existing(document) => return Ok(replayed(document)),
            Prepared::Fresh(document) => document,
        };
        ctx.unit.save_document(document.clone())?;
        ctx.emit(DOCUMENT, document.id, &DocumentEvent::created(&document, ctx.now))?;
        Ok(DocumentReceipt {
            document,
            replayed: false,
        })
    }
}

/// Issue a sale: `Pending`, stock taken, revenue/tax/COGS posted.
///
/// One entry: Dr receivable (total), Cr revenue (net), Cr tax payable (tax),
/// Dr COGS / Cr inventory (cost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoiceWithStockDeduction(pub NewDocument);

impl Operation for CreateInvoiceWithStockDeduction {
    const NAME: &'static str = "create_invoice_with_stock_deduction";
    type Output = DocumentReceipt;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<DocumentReceipt, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        require_kind(&self.0, DocumentKind::Sale)?;
        let mut document = match prepare(ctx, &self.0, true)? {
            Prepared::Existing(document) => return Ok(replayed(document)),
            Prepared::Fresh(document) => document,
        };
        issue_sale(ctx, &mut document)?;
        ctx.unit.save_document(document.clone())?;
        ctx.emit(DOCUMENT, document.id, &DocumentEvent::created(&document, ctx.now))?;
        Ok(DocumentReceipt {
            document,
            replayed: false,
        })
    }
}

/// Receive a purchase: `Confirmed`, stock added, inventory and input tax
/// debited against the vendor's payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseReceipt(pub NewDocument);

impl Operation for CreatePurchaseReceipt {
    const NAME: &'static str = "create_purchase_receipt";
    type Output = DocumentReceipt;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<DocumentReceipt, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        require_kind(&self.0, DocumentKind::Purchase)?;
        let mut document = match prepare(ctx, &self.0, true)? {
            Prepared::Existing(document) => return Ok(replayed(document)),
            Prepared::Fresh(document) => document,
        };
        issue_purchase(ctx, &mut document)?;
        ctx.unit.save_document(document.clone())?;
        ctx.emit(DOCUMENT, document.id, &DocumentEvent::created(&document, ctx.now))?;
        Ok(DocumentReceipt {
            document,
            replayed: false,
        })
    }
}

/// Issue an existing draft the way its creating operation would have. A draft
/// that already took payments keeps its payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDocument {
    pub document_id: DocumentId,
}

impl Operation for IssueDocument {
    const NAME: &'static str = "issue_document";
    type Output = BusinessDocument;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<BusinessDocument, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let mut document = ctx.services.tracker.document(&mut *ctx.unit, self.document_id)?;
        match document.kind {
            DocumentKind::Sale => issue_sale(ctx, &mut document)?,
            DocumentKind::Purchase => issue_purchase(ctx, &mut document)?,
        }
        ctx.unit.save_document(document.clone())?;
        ctx.emit(DOCUMENT, document.id, &DocumentEvent::issued(&document, ctx.now))?;
        Ok(document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDocumentPayment(pub PaymentRequest);

impl Operation for RecordDocumentPayment {
    const NAME: &'static str = "record_document_payment";
    type Output = PaymentOutcome;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<PaymentOutcome, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let outcome = ctx
            .services
            .tracker
            .apply_payment(&mut *ctx.unit, self.0.clone(), ctx.now)?;
        if !outcome.replayed {
            let now = ctx.now;
            ctx.emit(
                DOCUMENT,
                outcome.document.id,
                &DocumentEvent::payment_recorded(&outcome.document, &outcome.payment, now),
            )?;
            ctx.emit(JOURNAL_ENTRY, outcome.entry.id, &LedgerEvent::entry_posted(&outcome.entry, now))?;
        }
        Ok(outcome)
    }
}

/// Remove a draft, reversing anything that was posted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDraftDocument {
    pub document_id: DocumentId,
}

impl Operation for DeleteDraftDocument {
    const NAME: &'static str = "delete_draft_document";
    type Output = BusinessDocument;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<BusinessDocument, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let services = ctx.services;
        let (now, today) = (ctx.now, ctx.today());

        let document = services.tracker.document(&mut *ctx.unit, self.document_id)?;
        if document.status != DocumentStatus::Draft {
            return Err(DocumentError::NotDraft {
                document_id: document.id,
                status: document.status,
            }
            .into());
        }

        let reversals = services
            .tracker
            .reverse_postings(&mut *ctx.unit, &document, today, now)?;
        ctx.unit.remove_document(document.id)?;

        ctx.emit(DOCUMENT, document.id, &DocumentEvent::deleted(&document, now))?;
        emit_entries(ctx, &reversals)?;
        Ok(document)
    }
}

/// Cancel an unpaid document: postings are reversed and stock is put back
/// (sold stock returns, received stock leaves again).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDocument {
    pub document_id: DocumentId,
    /// Date of the reversing entries; today when absent.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl Operation for CancelDocument {
    const NAME: &'static str = "cancel_document";
    type Output = BusinessDocument;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<BusinessDocument, OperationError>
    where
        U: UnitOfWork + ?Sized,
    {
        let services = ctx.services;
        let now = ctx.now;
        let date = self.date.unwrap_or_else(|| ctx.today());

        let mut document = services.tracker.document(&mut *ctx.unit, self.document_id)?;
        document.cancel()?;
        let reversals = services
            .tracker
            .reverse_postings(&mut *ctx.unit, &document, date, now)?;

        if document.stock_applied {
            let stock = stock_lines(&document);
            let (items, sign) = match document.kind {
                DocumentKind::Sale => (services.guard.receive(&mut *ctx.unit, &stock)?, 1),
                DocumentKind::Purchase => {
                    let reservation = services.guard.reserve_for_sale(&mut *ctx.unit, &stock)?;
                    (services.guard.commit_reservation(&mut *ctx.unit, reservation)?, -1)
                }
            };
            document.stock_applied = false;
            emit_stock(ctx, &items, &stock, sign)?;
        }
        ctx.unit.save_document(document.clone())?;

        debug!(document_id = %document.id, reversals = reversals.len(), "document cancelled");
        ctx.emit(DOCUMENT, document.id, &DocumentEvent::cancelled(&document, now))?;
        emit_entries(ctx, &reversals)?;
        Ok(document)
    }
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

enum Prepared {
    Fresh(BusinessDocument),
    Existing(BusinessDocument),
}

fn replayed(document: BusinessDocument) -> DocumentReceipt {
    DocumentReceipt {
        document,
        replayed: true,
    }
}

fn require_kind(new: &NewDocument, kind: DocumentKind) -> Result<(), OperationError> {
    if new.kind == kind {
        Ok(())
    } else {
        Err(DocumentError::InvalidDocument(format!("expected a {kind} document, got {}", new.kind)).into())
    }
}

/// Replay check, partner and item checks, numbering.
///
/// A supplied number that already exists replays the stored document, but
/// only when it is what this operation would have produced: an operation
/// that `issues` never replays a document that was not issued.
fn prepare<U>(ctx: &mut UnitContext<'_, U>, new: &NewDocument, issues: bool) -> Result<Prepared, OperationError>
where
    U: UnitOfWork + ?Sized,
{
    let services = ctx.services;

    if let Some(number) = new.number.as_deref().map(str::trim) {
        if let Some(existing) = ctx.unit.document_by_number(new.kind, number)? {
            if issues && !existing.is_issued() {
                return Err(DocumentError::DuplicateNumber {
                    kind: new.kind,
                    number: number.to_string(),
                }
                .into());
            }
            debug!(document_id = %existing.id, number, "document number exists, replaying");
            return Ok(Prepared::Existing(existing));
        }
    }

    let partner = document_partner(ctx, new.partner_id, new.kind)?;
    // Rewriting the partner row makes a concurrent deactivation, which scanned
    // the partner's documents without this one, fail its commit.
    ctx.unit.save_partner(partner)?;
    for line in &new.lines {
        services.guard.item(&mut *ctx.unit, line.item_id)?;
    }

    let number = match new.number.as_deref() {
        Some(number) => number.to_string(),
        None => {
            // Skip values a client already used as an explicit number.
            let numbering = &services.document_numbering;
            loop {
                let value = ctx.unit.next_value(&numbering.series(new.kind))?;
                let candidate = format_number(numbering.prefix(new.kind), value, numbering.width);
                if ctx.unit.document_by_number(new.kind, &candidate)?.is_none() {
                    break candidate;
                }
            }
        }
    };
    Ok(Prepared::Fresh(BusinessDocument::draft(new.clone(), number, ctx.now)?))
}

/// Active partner of the kind the document needs.
fn document_partner<U>(
    ctx: &mut UnitContext<'_, U>,
    partner_id: PartnerId,
    kind: DocumentKind,
) -> Result<BusinessPartner, OperationError>
where
    U: UnitOfWork + ?Sized,
{
    let partner = ctx.services.partners.active_partner(&mut *ctx.unit, partner_id)?;
    let expected = match kind {
        DocumentKind::Sale => PartnerKind::Customer,
        DocumentKind::Purchase => PartnerKind::Vendor,
    };
    if partner.kind != expected {
        return Err(OperationError::WrongPartnerKind { partner_id, expected });
    }
    Ok(partner)
}

fn issue_sale<U>(ctx: &mut UnitContext<'_, U>, document: &mut BusinessDocument) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    let services = ctx.services;
    let partner = document_partner(ctx, document.partner_id, document.kind)?;
    document.issue(DocumentStatus::Pending, ctx.now)?;

    let stock = stock_lines(document);
    let reservation = services.guard.reserve_for_sale(&mut *ctx.unit, &stock)?;

    let totals = document.totals;
    let mut lines = Vec::new();
    if totals.total.is_positive() {
        lines.push(JournalLine::debit(partner.account_id, totals.total));
    }
    if totals.net().is_positive() {
        let revenue = services
            .ledger
            .account_by_code(&mut *ctx.unit, &services.roles.sales_revenue)?;
        lines.push(JournalLine::credit(revenue.id, totals.net()));
    }
    if totals.tax_total.is_positive() {
        let tax = services
            .ledger
            .account_by_code(&mut *ctx.unit, &services.roles.sales_tax_payable)?;
        lines.push(JournalLine::credit(tax.id, totals.tax_total));
    }
    lines.extend(services.guard.cogs_lines(&mut *ctx.unit, &stock)?);

    let memo = format!("Invoice {}", document.number);
    post_for(ctx, document, memo, lines)?;
    let items = services.guard.commit_reservation(&mut *ctx.unit, reservation)?;
    document.stock_applied = true;
    emit_stock(ctx, &items, &stock, -1)
}

fn issue_purchase<U>(ctx: &mut UnitContext<'_, U>, document: &mut BusinessDocument) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    let services = ctx.services;
    let partner = document_partner(ctx, document.partner_id, document.kind)?;
    document.issue(DocumentStatus::Confirmed, ctx.now)?;

    let stock = stock_lines(document);
    let mut net_by_item: Vec<(InventoryItemId, Money)> = Vec::with_capacity(document.lines.len());
    for line in &document.lines {
        let amounts = line.amounts().ok_or(DocumentError::AmountOverflow)?;
        net_by_item.push((line.item_id, amounts.net));
    }

    let totals = document.totals;
    let mut lines = services.guard.inventory_debits(&mut *ctx.unit, &net_by_item)?;
    if totals.tax_total.is_positive() {
        let input_tax = services
            .ledger
            .account_by_code(&mut *ctx.unit, &services.roles.input_tax)?;
        lines.push(JournalLine::debit(input_tax.id, totals.tax_total));
    }
    if totals.total.is_positive() {
        lines.push(JournalLine::credit(partner.account_id, totals.total));
    }

    let memo = format!("Purchase {}", document.number);
    post_for(ctx, document, memo, lines)?;
    let items = services.guard.receive(&mut *ctx.unit, &stock)?;
    document.stock_applied = true;
    emit_stock(ctx, &items, &stock, 1)
}

/// Post `lines` for a document and link the entry. A document whose every
/// amount is zero posts nothing.
fn post_for<U>(
    ctx: &mut UnitContext<'_, U>,
    document: &mut BusinessDocument,
    memo: String,
    lines: Vec<JournalLine>,
) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    if lines.is_empty() {
        return Ok(());
    }
    let new = lines
        .into_iter()
        .fold(NewJournalEntry::new(document.date, memo), NewJournalEntry::line);
    let entry = ctx.services.engine.post(&mut *ctx.unit, new, ctx.now)?;
    document.postings.push(entry.id);
    ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_posted(&entry, ctx.now))
}

fn stock_lines(document: &BusinessDocument) -> Vec<StockLine> {
    document
        .lines
        .iter()
        .map(|l| StockLine::new(l.item_id, l.quantity))
        .collect()
}

fn emit_stock<U>(
    ctx: &mut UnitContext<'_, U>,
    items: &[InventoryItem],
    moved: &[StockLine],
    sign: i64,
) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    for item in items {
        let quantity: i64 = moved
            .iter()
            .filter(|l| l.item_id == item.id)
            .map(|l| l.quantity)
            .sum();
        ctx.emit(
            INVENTORY_ITEM,
            item.id,
            &StockEvent::stock_adjusted(item, sign * quantity, ctx.now),
        )?;
    }
    Ok(())
}

fn emit_entries<U>(ctx: &mut UnitContext<'_, U>, entries: &[JournalEntry]) -> Result<(), OperationError>
where
    U: UnitOfWork + ?Sized,
{
    for entry in entries {
        ctx.emit(JOURNAL_ENTRY, entry.id, &LedgerEvent::entry_posted(entry, ctx.now))?;
    }
    Ok(())
}
