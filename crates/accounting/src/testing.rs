//! Non-transactional row double for unit tests.

use std::collections::HashMap;

use tally_core::{AccountId, JournalEntryId, Sequences, StoreResult};

use crate::account::Account;
use crate::journal::{JournalEntry, JournalRows};
use crate::ledger::AccountRows;

#[derive(Debug, Default)]
pub(crate) struct MemoryBooks {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    sequences: HashMap<String, u64>,
}

impl MemoryBooks {
    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl AccountRows for MemoryBooks {
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

impl JournalRows for MemoryBooks {
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

impl Sequences for MemoryBooks {
    fn next_value(&mut self, series: &str) -> StoreResult<u64> {
        let value = self.sequences.entry(series.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
