use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, Entity, Money};

/// Debit or credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn flipped(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    /// Express `amount` on this side in the debit-positive convention.
    pub fn signed(self, amount: Money) -> Money {
        match self {
            Side::Debit => amount,
            Side::Credit => -amount,
        }
    }
}

/// Account category (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
    CostOfGoodsSold,
}

impl AccountType {
    pub const ALL: [AccountType; 6] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
        AccountType::CostOfGoodsSold,
    ];

    /// The side on which accounts of this type grow.
    pub fn normal_side(self) -> Side {
        match self {
            AccountType::Asset | AccountType::Expense | AccountType::CostOfGoodsSold => Side::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => Side::Credit,
        }
    }
}

/// Chart-of-accounts entry with its running balance.
///
/// `balance` is expressed on the normal side: a positive balance on a revenue
/// account means net credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Money,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn normal_side(&self) -> Side {
        self.account_type.normal_side()
    }

    /// Balance after applying a debit-positive delta, or `None` on overflow.
    pub fn balance_after(&self, signed: Money) -> Option<Money> {
        match self.normal_side() {
            Side::Debit => self.balance.checked_add(signed),
            Side::Credit => self.balance.checked_sub(signed),
        }
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn natural_key(&self) -> Option<String> {
        Some(self.code.clone())
    }
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
}

impl NewAccount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
        }
    }
}
