//! Non-transactional row double for unit tests.

use std::collections::HashMap;

use tally_accounting::{Account, AccountRows, JournalEntry, JournalRows};
use tally_core::{AccountId, DocumentId, JournalEntryId, PartnerId, Sequences, StoreResult};
use tally_parties::{BusinessPartner, PartnerRows};

use crate::document::{BusinessDocument, DocumentKind, DocumentRows};

#[derive(Debug, Default)]
pub(crate) struct MemoryRows {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    partners: HashMap<PartnerId, BusinessPartner>,
    documents: HashMap<DocumentId, BusinessDocument>,
    sequences: HashMap<String, u64>,
}

impl AccountRows for MemoryRows {
    fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.get(&id).cloned())
    }

    fn account_by_code(&mut self, code: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.values().find(|a| a.code == code).cloned())
    }

    fn accounts(&mut self) -> StoreResult<Vec<Account>> {
        Ok(self.accounts.values().cloned().collect())
    }

    fn save_account(&mut self, account: Account) -> StoreResult<()> {
        self.accounts.insert(account.id, account);
        Ok(())
    }
}

impl JournalRows for MemoryRows {
    fn entry(&mut self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>> {
        Ok(self.entries.get(&id).cloned())
    }

    fn entry_by_number(&mut self, number: &str) -> StoreResult<Option<JournalEntry>> {
        Ok(self.entries.values().find(|e| e.number == number).cloned())
    }

    fn save_entry(&mut self, entry: JournalEntry) -> StoreResult<()> {
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    fn remove_entry(&mut self, id: JournalEntryId) -> StoreResult<()> {
        self.entries.remove(&id);
        Ok(())
    }
}

impl PartnerRows for MemoryRows {
    fn partner(&mut self, id: PartnerId) -> StoreResult<Option<BusinessPartner>> {
        Ok(self.partners.get(&id).cloned())
    }

    fn save_partner(&mut self, partner: BusinessPartner) -> StoreResult<()> {
        self.partners.insert(partner.id, partner);
        Ok(())
    }
}

impl DocumentRows for MemoryRows {
    fn document(&mut self, id: DocumentId) -> StoreResult<Option<BusinessDocument>> {
        Ok(self.documents.get(&id).cloned())
    }

    fn document_by_number(&mut self, kind: DocumentKind, number: &str) -> StoreResult<Option<BusinessDocument>> {
        Ok(self
            .documents
            .values()
            .find(|d| d.kind == kind && d.number == number)
            .cloned())
    }

    fn documents(&mut self) -> StoreResult<Vec<BusinessDocument>> {
        Ok(self.documents.values().cloned().collect())
    }

    fn save_document(&mut self, document: BusinessDocument) -> StoreResult<()> {
        self.documents.insert(document.id, document);
        Ok(())
    }

    fn remove_document(&mut self, id: DocumentId) -> StoreResult<()> {
        self.documents.remove(&id);
        Ok(())
    }
}

impl Sequences for MemoryRows {
    fn next_value(&mut self, series: &str) -> StoreResult<u64> {
        let value = self.sequences.entry(series.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
