//! Non-transactional row double for unit tests.

use std::collections::HashMap;

use tally_accounting::{Account, AccountRows};
use tally_core::{AccountId, InventoryItemId, StoreResult};

use crate::item::{InventoryItem, ItemRows};

#[derive(Debug, Default)]
pub(crate) struct MemoryStock {
    accounts: HashMap<AccountId, Account>,
    items: HashMap<InventoryItemId, InventoryItem>,
}

impl AccountRows for MemoryStock {
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

impl ItemRows for MemoryStock {
    fn item(&mut self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        Ok(self.items.get(&id).cloned())
    }

    fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<InventoryItem>> {
        Ok(self.items.values().find(|i| i.sku == sku).cloned())
    }

    fn save_item(&mut self, item: InventoryItem) -> StoreResult<()> {
        self.items.insert(item.id, item);
        Ok(())
    }
}
