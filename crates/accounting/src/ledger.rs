use chrono::{DateTime, Utc};
use tracing::debug;

use tally_core::{AccountId, Money, StoreResult};

use crate::account::{Account, AccountType, NewAccount};
use crate::chart::AccountTemplate;
use crate::error::LedgerError;

/// Persistence port for accounts.
///
/// Reads take `&mut self` so a unit of work can record what it read. Writes made
/// through the same value must be visible to its later reads.
pub trait AccountRows {
    fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>>;

    fn account_by_code(&mut self, code: &str) -> StoreResult<Option<Account>>;

    /// Every account, in no particular order.
    fn accounts(&mut self) -> StoreResult<Vec<Account>>;

    /// Insert or replace.
    fn save_account(&mut self, account: Account) -> StoreResult<()>;
}

/// The account ledger store: sole owner of account balances.
///
/// Stateless; the rows it works on are passed per call so the same value can be
/// shared by every unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerStore;

impl LedgerStore {
    pub fn new() -> Self {
        Self
    }

    pub fn create_account<R>(
        &self,
        rows: &mut R,
        new: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        let code = new.code.trim();
        let name = new.name.trim();
        if code.is_empty() {
            return Err(LedgerError::InvalidAccount("code cannot be empty".to_string()));
        }
        if name.is_empty() {
            return Err(LedgerError::InvalidAccount("name cannot be empty".to_string()));
        }
        if rows.account_by_code(code)?.is_some() {
            return Err(LedgerError::DuplicateCode(code.to_string()));
        }

        let account = Account {
            id: AccountId::new(),
            code: code.to_string(),
            name: name.to_string(),
            account_type: new.account_type,
            balance: Money::ZERO,
            active: true,
            created_at: now,
        };
        rows.save_account(account.clone())?;

        debug!(account_id = %account.id, code = %account.code, "account created");
        Ok(account)
    }

    /// Create every template whose code is not taken yet; returns the new accounts.
    pub fn initialize_chart<R>(
        &self,
        rows: &mut R,
        templates: &[AccountTemplate],
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        let mut created = Vec::new();
        for t in templates {
            if rows.account_by_code(t.code)?.is_some() {
                continue;
            }
            let new = NewAccount::new(t.code, t.name, t.account_type);
            created.push(self.create_account(rows, new, now)?);
        }
        Ok(created)
    }

    pub fn account<R>(&self, rows: &mut R, id: AccountId) -> Result<Account, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        rows.account(id)?.ok_or(LedgerError::UnknownAccount(id))
    }

    pub fn account_by_code<R>(&self, rows: &mut R, code: &str) -> Result<Account, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        rows.account_by_code(code)?
            .ok_or_else(|| LedgerError::UnknownAccountCode(code.to_string()))
    }

    /// Apply a debit-positive delta to an active account; returns the new balance.
    ///
    /// A debit raises debit-normal balances and lowers credit-normal ones; a
    /// credit does the opposite.
    pub fn post_balance_delta<R>(
        &self,
        rows: &mut R,
        id: AccountId,
        signed: Money,
    ) -> Result<Money, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        let mut account = self.account(rows, id)?;
        if !account.active {
            return Err(LedgerError::InactiveAccount(id));
        }
        let balance = account
            .balance_after(signed)
            .ok_or(LedgerError::AmountOverflow)?;
        account.balance = balance;
        rows.save_account(account)?;
        Ok(balance)
    }

    pub fn get_balance<R>(&self, rows: &mut R, id: AccountId) -> Result<Money, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        Ok(self.account(rows, id)?.balance)
    }

    /// Accounts of one type, ordered by code.
    pub fn list_by_category<R>(
        &self,
        rows: &mut R,
        category: AccountType,
    ) -> Result<Vec<Account>, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        let mut accounts: Vec<Account> = rows
            .accounts()?
            .into_iter()
            .filter(|a| a.account_type == category)
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    /// Soft-delete. Only accounts with a zero balance can be deactivated.
    pub fn deactivate_account<R>(&self, rows: &mut R, id: AccountId) -> Result<Account, LedgerError>
    where
        R: AccountRows + ?Sized,
    {
        let mut account = self.account(rows, id)?;
        if !account.balance.is_zero() {
            return Err(LedgerError::NonZeroBalance {
                account_id: id,
                balance: account.balance,
            });
        }
        if account.active {
            account.active = false;
            rows.save_account(account.clone())?;
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::DEFAULT_CHART;
    use crate::testing::MemoryBooks;

    fn cash(books: &mut MemoryBooks) -> Account {
        LedgerStore
            .create_account(books, NewAccount::new("1000", "Cash", AccountType::Asset), Utc::now())
            .unwrap()
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut books = MemoryBooks::default();
        cash(&mut books);

        let err = LedgerStore
            .create_account(
                &mut books,
                NewAccount::new(" 1000 ", "Petty cash", AccountType::Asset),
                Utc::now(),
            )
            .unwrap_err();

        assert_eq!(err, LedgerError::DuplicateCode("1000".to_string()));
    }

    #[test]
    fn blank_codes_are_rejected() {
        let mut books = MemoryBooks::default();
        let err = LedgerStore
            .create_account(&mut books, NewAccount::new("  ", "Cash", AccountType::Asset), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccount(_)));
    }

    #[test]
    fn deltas_follow_the_normal_side() {
        let mut books = MemoryBooks::default();
        let cash = cash(&mut books);
        let revenue = LedgerStore
            .create_account(
                &mut books,
                NewAccount::new("4000", "Sales Revenue", AccountType::Revenue),
                Utc::now(),
            )
            .unwrap();

        // Debit cash 100, credit revenue 100.
        LedgerStore
            .post_balance_delta(&mut books, cash.id, Money::from_minor(10_000))
            .unwrap();
        LedgerStore
            .post_balance_delta(&mut books, revenue.id, Money::from_minor(-10_000))
            .unwrap();

        assert_eq!(LedgerStore.get_balance(&mut books, cash.id).unwrap(), Money::from_minor(10_000));
        assert_eq!(LedgerStore.get_balance(&mut books, revenue.id).unwrap(), Money::from_minor(10_000));
    }

    #[test]
    fn inactive_accounts_refuse_deltas() {
        let mut books = MemoryBooks::default();
        let cash = cash(&mut books);
        LedgerStore.deactivate_account(&mut books, cash.id).unwrap();

        let err = LedgerStore
            .post_balance_delta(&mut books, cash.id, Money::from_minor(1))
            .unwrap_err();
        assert_eq!(err, LedgerError::InactiveAccount(cash.id));
    }

    #[test]
    fn unknown_accounts_are_reported() {
        let mut books = MemoryBooks::default();
        let id = AccountId::new();
        let err = LedgerStore
            .post_balance_delta(&mut books, id, Money::from_minor(1))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownAccount(id));
    }

    #[test]
    fn accounts_with_a_balance_cannot_be_deactivated() {
        let mut books = MemoryBooks::default();
        let cash = cash(&mut books);
        LedgerStore
            .post_balance_delta(&mut books, cash.id, Money::from_minor(500))
            .unwrap();

        let err = LedgerStore.deactivate_account(&mut books, cash.id).unwrap_err();
        assert!(matches!(err, LedgerError::NonZeroBalance { balance, .. } if balance == Money::from_minor(500)));
        assert!(LedgerStore.account(&mut books, cash.id).unwrap().active);
    }

    #[test]
    fn chart_initialization_skips_existing_codes() {
        let mut books = MemoryBooks::default();
        cash(&mut books);

        let created = LedgerStore
            .initialize_chart(&mut books, DEFAULT_CHART, Utc::now())
            .unwrap();

        assert_eq!(created.len(), DEFAULT_CHART.len() - 1);
        let assets = LedgerStore.list_by_category(&mut books, AccountType::Asset).unwrap();
        let codes: Vec<_> = assets.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["1000", "1010", "1200", "1300", "1400"]);
    }
}
