use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_accounting::{AccountRows, AccountType, JournalLine, LedgerStore};
use tally_core::{AccountId, InventoryItemId, Money};

use crate::error::InventoryError;
use crate::item::{InventoryItem, ItemRows, NewItem, ValuationClass};

/// A quantity of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub item_id: InventoryItemId,
    pub quantity: i64,
}

impl StockLine {
    pub fn new(item_id: InventoryItemId, quantity: i64) -> Self {
        Self { item_id, quantity }
    }
}

/// A checked batch of stock decrements, one entry per item.
///
/// Only [`InventoryGuard::reserve_for_sale`] creates one, and only
/// [`InventoryGuard::commit_reservation`] consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation changes nothing until it is committed"]
pub struct Reservation {
    lines: Vec<StockLine>,
}

impl Reservation {
    pub fn lines(&self) -> &[StockLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Keeps stock quantities non-negative and values movements at cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryGuard {
    ledger: LedgerStore,
}

impl InventoryGuard {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    pub fn create_item<R>(
        &self,
        rows: &mut R,
        new: NewItem,
        now: DateTime<Utc>,
    ) -> Result<InventoryItem, InventoryError>
    where
        R: ItemRows + AccountRows + ?Sized,
    {
        let sku = new.sku.trim();
        let name = new.name.trim();
        if sku.is_empty() {
            return Err(InventoryError::InvalidItem("sku cannot be empty".to_string()));
        }
        if name.is_empty() {
            return Err(InventoryError::InvalidItem("name cannot be empty".to_string()));
        }
        if new.sales_price.is_negative() || new.purchase_price.is_negative() {
            return Err(InventoryError::InvalidItem("prices cannot be negative".to_string()));
        }
        if rows.item_by_sku(sku)?.is_some() {
            return Err(InventoryError::DuplicateSku(sku.to_string()));
        }

        let id = InventoryItemId::new();
        if new.opening_quantity < 0 {
            return Err(InventoryError::InvalidQuantity {
                item_id: id,
                quantity: new.opening_quantity,
            });
        }
        self.check_valuation(rows, new.valuation)?;

        let item = InventoryItem {
            id,
            sku: sku.to_string(),
            name: name.to_string(),
            available_quantity: new.opening_quantity,
            sales_price: new.sales_price,
            purchase_price: new.purchase_price,
            valuation: new.valuation,
            created_at: now,
        };
        rows.save_item(item.clone())?;

        debug!(item_id = %item.id, sku = %item.sku, "inventory item created");
        Ok(item)
    }

    pub fn item<R>(&self, rows: &mut R, id: InventoryItemId) -> Result<InventoryItem, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        rows.item(id)?.ok_or(InventoryError::ItemNotFound(id))
    }

    /// Check that every line of the batch can be taken from stock.
    ///
    /// Lines for the same item are summed first, so two lines of 3 against a
    /// stock of 5 fail even though each fits on its own. Nothing is written.
    pub fn reserve_for_sale<R>(
        &self,
        rows: &mut R,
        lines: &[StockLine],
    ) -> Result<Reservation, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let lines = aggregate(lines)?;
        for line in &lines {
            check_available(&self.item(rows, line.item_id)?, line.quantity)?;
        }
        debug!(items = lines.len(), "stock reserved");
        Ok(Reservation { lines })
    }

    /// Apply the decrements of a reservation.
    ///
    /// Availability is checked again for the whole batch first, so a
    /// reservation taken before another write in the same unit cannot drive
    /// stock negative.
    pub fn commit_reservation<R>(
        &self,
        rows: &mut R,
        reservation: Reservation,
    ) -> Result<Vec<InventoryItem>, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let mut items = Vec::with_capacity(reservation.lines.len());
        for line in &reservation.lines {
            let item = self.item(rows, line.item_id)?;
            check_available(&item, line.quantity)?;
            items.push((item, line.quantity));
        }

        let mut updated = Vec::with_capacity(items.len());
        for (mut item, quantity) in items {
            item.available_quantity -= quantity;
            rows.save_item(item.clone())?;
            updated.push(item);
        }
        Ok(updated)
    }

    /// Add stock: purchase receipts, or sold stock coming back.
    pub fn receive<R>(
        &self,
        rows: &mut R,
        lines: &[StockLine],
    ) -> Result<Vec<InventoryItem>, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let lines = aggregate(lines)?;
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let mut item = self.item(rows, line.item_id)?;
            item.available_quantity = item
                .available_quantity
                .checked_add(line.quantity)
                .ok_or(InventoryError::AmountOverflow)?;
            items.push(item);
        }

        for item in &items {
            rows.save_item(item.clone())?;
        }
        debug!(items = items.len(), "stock received");
        Ok(items)
    }

    /// Σ quantity × purchase price.
    pub fn cost_of_goods_sold<R>(&self, rows: &mut R, lines: &[StockLine]) -> Result<Money, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let mut total = Money::ZERO;
        for line in lines {
            let cost = self.line_cost(rows, line)?;
            total = total.checked_add(cost).ok_or(InventoryError::AmountOverflow)?;
        }
        Ok(total)
    }

    /// Debit COGS / credit Inventory, one pair per valuation class with a
    /// non-zero cost, in first-seen order.
    pub fn cogs_lines<R>(&self, rows: &mut R, lines: &[StockLine]) -> Result<Vec<JournalLine>, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let mut by_class: Vec<(ValuationClass, Money)> = Vec::new();
        for line in lines {
            let item = self.item(rows, line.item_id)?;
            let cost = self.line_cost(rows, line)?;
            add_to(&mut by_class, item.valuation, cost)?;
        }

        Ok(by_class
            .into_iter()
            .filter(|(_, cost)| cost.is_positive())
            .flat_map(|(class, cost)| {
                [
                    JournalLine::debit(class.cogs_account, cost),
                    JournalLine::credit(class.inventory_account, cost),
                ]
            })
            .collect())
    }

    /// Debit lines putting `amounts` on each item's inventory account, grouped
    /// by account in first-seen order.
    pub fn inventory_debits<R>(
        &self,
        rows: &mut R,
        amounts: &[(InventoryItemId, Money)],
    ) -> Result<Vec<JournalLine>, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        let mut by_account: Vec<(AccountId, Money)> = Vec::new();
        for (item_id, amount) in amounts {
            let item = self.item(rows, *item_id)?;
            add_to(&mut by_account, item.valuation.inventory_account, *amount)?;
        }
        Ok(by_account
            .into_iter()
            .filter(|(_, amount)| amount.is_positive())
            .map(|(account, amount)| JournalLine::debit(account, amount))
            .collect())
    }

    fn line_cost<R>(&self, rows: &mut R, line: &StockLine) -> Result<Money, InventoryError>
    where
        R: ItemRows + ?Sized,
    {
        if line.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity {
                item_id: line.item_id,
                quantity: line.quantity,
            });
        }
        self.item(rows, line.item_id)?
            .cost_of(line.quantity)
            .ok_or(InventoryError::AmountOverflow)
    }

    fn check_valuation<R>(&self, rows: &mut R, class: ValuationClass) -> Result<(), InventoryError>
    where
        R: AccountRows + ?Sized,
    {
        let checks = [
            (class.inventory_account, AccountType::Asset, "inventory"),
            (class.cogs_account, AccountType::CostOfGoodsSold, "cost of goods sold"),
        ];
        for (id, expected, role) in checks {
            let account = match self.ledger.account(rows, id) {
                Ok(account) => account,
                Err(tally_accounting::LedgerError::UnknownAccount(_)) => {
                    return Err(InventoryError::InvalidValuationClass(format!(
                        "{role} account {id} does not exist"
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            if account.account_type != expected {
                return Err(InventoryError::InvalidValuationClass(format!(
                    "{role} account {} has type {:?}",
                    account.code, account.account_type
                )));
            }
            if !account.active {
                return Err(InventoryError::InvalidValuationClass(format!(
                    "{role} account {} is inactive",
                    account.code
                )));
            }
        }
        Ok(())
    }
}

fn check_available(item: &InventoryItem, requested: i64) -> Result<(), InventoryError> {
    if requested > item.available_quantity {
        return Err(InventoryError::InsufficientStock {
            item_id: item.id,
            requested,
            available: item.available_quantity,
        });
    }
    Ok(())
}

/// Validate quantities and merge lines per item, keeping first-seen order.
fn aggregate(lines: &[StockLine]) -> Result<Vec<StockLine>, InventoryError> {
    let mut merged: Vec<StockLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(InventoryError::InvalidQuantity {
                item_id: line.item_id,
                quantity: line.quantity,
            });
        }
        match merged.iter_mut().find(|m| m.item_id == line.item_id) {
            Some(m) => {
                m.quantity = m
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(InventoryError::AmountOverflow)?;
            }
            None => merged.push(*line),
        }
    }
    Ok(merged)
}

fn add_to<K: PartialEq>(groups: &mut Vec<(K, Money)>, key: K, amount: Money) -> Result<(), InventoryError> {
    match groups.iter_mut().find(|(k, _)| *k == key) {
        Some((_, total)) => {
            *total = total.checked_add(amount).ok_or(InventoryError::AmountOverflow)?;
        }
        None => groups.push((key, amount)),
    }
    Ok(())
}
