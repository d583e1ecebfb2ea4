//! Read-only queries. Each runs on its own unit, which is dropped uncommitted.

use tally_accounting::{Account, AccountType, JournalEntry};
use tally_core::{AccountId, DocumentId, InventoryItemId, JournalEntryId, Money, PartnerId};
use tally_documents::{BusinessDocument, DocumentKind, DocumentRows, DocumentStatus};
use tally_events::EventBus;
use tally_inventory::InventoryItem;
use tally_parties::{BusinessPartner, Reconciliation};

use super::{Notification, OperationError, Orchestrator};
use crate::store::Store;

impl<S, B> Orchestrator<S, B>
where
    S: Store,
    B: EventBus<Notification>,
{
    pub fn balance(&self, account_id: AccountId) -> Result<Money, OperationError> {
        self.read(|unit, services| Ok(services.ledger.get_balance(unit, account_id)?))
    }

    pub fn account_by_code(&self, code: &str) -> Result<Account, OperationError> {
        self.read(|unit, services| Ok(services.ledger.account_by_code(unit, code)?))
    }

    pub fn accounts_by_category(&self, category: AccountType) -> Result<Vec<Account>, OperationError> {
        self.read(|unit, services| Ok(services.ledger.list_by_category(unit, category)?))
    }

    pub fn entry(&self, entry_id: JournalEntryId) -> Result<JournalEntry, OperationError> {
        self.read(|unit, services| Ok(services.engine.entry(unit, entry_id)?))
    }

    pub fn item(&self, item_id: InventoryItemId) -> Result<InventoryItem, OperationError> {
        self.read(|unit, services| Ok(services.guard.item(unit, item_id)?))
    }

    pub fn partner(&self, partner_id: PartnerId) -> Result<BusinessPartner, OperationError> {
        self.read(|unit, services| Ok(services.partners.partner(unit, partner_id)?))
    }

    pub fn document(&self, document_id: DocumentId) -> Result<BusinessDocument, OperationError> {
        self.read(|unit, services| Ok(services.tracker.document(unit, document_id)?))
    }

    /// Documents in `status`, optionally of one kind, newest first.
    pub fn documents_by_status(
        &self,
        kind: Option<DocumentKind>,
        status: DocumentStatus,
    ) -> Result<Vec<BusinessDocument>, OperationError> {
        self.read(|unit, _| Ok(tally_documents::list_by_status(unit, kind, status)?))
    }

    /// Case-insensitive search over number, memo and partner name.
    pub fn search_documents(&self, text: &str) -> Result<Vec<BusinessDocument>, OperationError> {
        self.read(|unit, _| Ok(tally_documents::search(unit, text)?))
    }

    /// What the partner's open documents add up to, next to the balance of
    /// their control account.
    pub fn partner_balance(&self, partner_id: PartnerId) -> Result<Reconciliation, OperationError> {
        self.read(|unit, services| {
            let documents = unit.documents()?;
            Ok(services.partners.reconcile(unit, partner_id, &documents)?)
        })
    }
}
