use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, JournalEntryId, Money};
use tally_events::Event;

use crate::account::{Account, AccountType};
use crate::journal::JournalEntry;

/// Event: AccountCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub account_id: AccountId,
    pub code: String,
    pub account_type: AccountType,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeactivated {
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryPosted (also emitted for reversals, with `reverses` set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPosted {
    pub entry_id: JournalEntryId,
    pub number: String,
    pub total: Money,
    pub reverses: Option<JournalEntryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUpdated {
    pub entry_id: JournalEntryId,
    pub number: String,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDeleted {
    pub entry_id: JournalEntryId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AccountCreated(AccountCreated),
    AccountDeactivated(AccountDeactivated),
    EntryPosted(EntryPosted),
    EntryUpdated(EntryUpdated),
    EntryDeleted(EntryDeleted),
}

impl LedgerEvent {
    pub fn account_created(account: &Account, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::AccountCreated(AccountCreated {
            account_id: account.id,
            code: account.code.clone(),
            account_type: account.account_type,
            occurred_at,
        })
    }

    pub fn account_deactivated(account: &Account, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::AccountDeactivated(AccountDeactivated {
            account_id: account.id,
            occurred_at,
        })
    }

    pub fn entry_posted(entry: &JournalEntry, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::EntryPosted(EntryPosted {
            entry_id: entry.id,
            number: entry.number.clone(),
            total: entry.totals().debits,
            reverses: entry.reverses,
            occurred_at,
        })
    }

    pub fn entry_updated(entry: &JournalEntry, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::EntryUpdated(EntryUpdated {
            entry_id: entry.id,
            number: entry.number.clone(),
            total: entry.totals().debits,
            occurred_at,
        })
    }

    pub fn entry_deleted(entry: &JournalEntry, occurred_at: DateTime<Utc>) -> Self {
        LedgerEvent::EntryDeleted(EntryDeleted {
            entry_id: entry.id,
            number: entry.number.clone(),
            occurred_at,
        })
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::AccountCreated(_) => "ledger.account.created",
            LedgerEvent::AccountDeactivated(_) => "ledger.account.deactivated",
            LedgerEvent::EntryPosted(_) => "ledger.entry.posted",
            LedgerEvent::EntryUpdated(_) => "ledger.entry.updated",
            LedgerEvent::EntryDeleted(_) => "ledger.entry.deleted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::AccountCreated(e) => e.occurred_at,
            LedgerEvent::AccountDeactivated(e) => e.occurred_at,
            LedgerEvent::EntryPosted(e) => e.occurred_at,
            LedgerEvent::EntryUpdated(e) => e.occurred_at,
            LedgerEvent::EntryDeleted(e) => e.occurred_at,
        }
    }
}
