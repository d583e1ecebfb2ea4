//! Default chart of accounts for a small trading business.

use crate::account::AccountType;

/// Seed data for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountTemplate {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
}

const fn template(code: &'static str, name: &'static str, account_type: AccountType) -> AccountTemplate {
    AccountTemplate {
        code,
        name,
        account_type,
    }
}

pub const CASH: &str = "1000";
pub const BANK: &str = "1010";
pub const ACCOUNTS_RECEIVABLE: &str = "1200";
pub const INVENTORY: &str = "1300";
pub const INPUT_TAX: &str = "1400";
pub const ACCOUNTS_PAYABLE: &str = "2000";
pub const SALES_TAX_PAYABLE: &str = "2100";
pub const OWNERS_EQUITY: &str = "3000";
pub const SALES_REVENUE: &str = "4000";
pub const COST_OF_GOODS_SOLD: &str = "5000";
pub const OPERATING_EXPENSES: &str = "6000";

pub const DEFAULT_CHART: &[AccountTemplate] = &[
    template(CASH, "Cash", AccountType::Asset),
    template(BANK, "Bank", AccountType::Asset),
    template(ACCOUNTS_RECEIVABLE, "Accounts Receivable", AccountType::Asset),
    template(INVENTORY, "Inventory", AccountType::Asset),
    template(INPUT_TAX, "Input Tax Receivable", AccountType::Asset),
    template(ACCOUNTS_PAYABLE, "Accounts Payable", AccountType::Liability),
    template(SALES_TAX_PAYABLE, "Sales Tax Payable", AccountType::Liability),
    template(OWNERS_EQUITY, "Owner's Equity", AccountType::Equity),
    template(SALES_REVENUE, "Sales Revenue", AccountType::Revenue),
    template(COST_OF_GOODS_SOLD, "Cost of Goods Sold", AccountType::CostOfGoodsSold),
    template(OPERATING_EXPENSES, "Operating Expenses", AccountType::Expense),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_chart_codes_are_unique() {
        let codes: HashSet<_> = DEFAULT_CHART.iter().map(|t| t.code).collect();
        assert_eq!(codes.len(), DEFAULT_CHART.len());
    }
}
