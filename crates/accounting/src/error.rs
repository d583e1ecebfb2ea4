use thiserror::Error;

use tally_core::{AccountId, Classify, ErrorKind, JournalEntryId, Money, StoreError};

/// Failures of the account ledger store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account code '{0}' already exists")]
    DuplicateCode(String),

    #[error("invalid account: {0}")]
    InvalidAccount(String),

    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("no account with code '{0}'")]
    UnknownAccountCode(String),

    #[error("account {0} is inactive")]
    InactiveAccount(AccountId),

    #[error("account {account_id} still carries a balance of {balance}")]
    NonZeroBalance { account_id: AccountId, balance: Money },

    #[error("amount overflow")]
    AmountOverflow,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for LedgerError {
    fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::DuplicateCode(_)
            | LedgerError::InvalidAccount(_)
            | LedgerError::AmountOverflow => ErrorKind::Validation,
            LedgerError::UnknownAccount(_)
            | LedgerError::UnknownAccountCode(_)
            | LedgerError::InactiveAccount(_)
            | LedgerError::NonZeroBalance { .. } => ErrorKind::StateConflict,
            LedgerError::Store(e) => e.kind(),
        }
    }
}

/// Failures of the journal posting engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JournalError {
    #[error("journal entry has no lines")]
    EmptyEntry,

    #[error("line {index} has non-positive amount {amount}")]
    ZeroAmountLine { index: usize, amount: Money },

    #[error("debits ({debits}) do not equal credits ({credits})")]
    Unbalanced { debits: Money, credits: Money },

    #[error("line references inactive account {0}")]
    InactiveAccountReference(AccountId),

    #[error("line references unknown account {0}")]
    UnknownAccountReference(AccountId),

    #[error("journal entry {0} not found")]
    EntryNotFound(JournalEntryId),

    #[error("journal entry {0} has already been reversed")]
    AlreadyReversed(JournalEntryId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for JournalError {
    fn kind(&self) -> ErrorKind {
        match self {
            JournalError::EmptyEntry
            | JournalError::ZeroAmountLine { .. }
            | JournalError::Unbalanced { .. } => ErrorKind::Validation,
            JournalError::InactiveAccountReference(_)
            | JournalError::UnknownAccountReference(_)
            | JournalError::EntryNotFound(_)
            | JournalError::AlreadyReversed(_) => ErrorKind::StateConflict,
            JournalError::Ledger(e) => e.kind(),
            JournalError::Store(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_store_conflicts_stay_retryable() {
        let err = JournalError::Ledger(LedgerError::Store(StoreError::conflict("row")));
        assert_eq!(err.kind(), ErrorKind::Concurrency);
    }

    #[test]
    fn input_problems_are_validation_errors() {
        assert_eq!(JournalError::EmptyEntry.kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::DuplicateCode("1000".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            LedgerError::InactiveAccount(AccountId::new()).kind(),
            ErrorKind::StateConflict
        );
    }
}
