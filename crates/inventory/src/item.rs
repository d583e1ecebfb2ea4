use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, Entity, InventoryItemId, Money, StoreResult};

/// Ledger accounts an item's stock is carried in and expensed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValuationClass {
    /// Asset account holding the stock value.
    pub inventory_account: AccountId,
    /// Cost-of-goods-sold account debited when stock is sold.
    pub cogs_account: AccountId,
}

/// A stocked catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub sku: String,
    pub name: String,
    /// Never negative.
    pub available_quantity: i64,
    pub sales_price: Money,
    /// Unit cost used for valuation.
    pub purchase_price: Money,
    pub valuation: ValuationClass,
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Value of `quantity` units at purchase price, `None` on overflow.
    pub fn cost_of(&self, quantity: i64) -> Option<Money> {
        self.purchase_price.checked_mul(quantity)
    }
}

impl Entity for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn natural_key(&self) -> Option<String> {
        Some(self.sku.clone())
    }
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub opening_quantity: i64,
    pub sales_price: Money,
    pub purchase_price: Money,
    pub valuation: ValuationClass,
}

impl NewItem {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        purchase_price: Money,
        sales_price: Money,
        valuation: ValuationClass,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            opening_quantity: 0,
            sales_price,
            purchase_price,
            valuation,
        }
    }

    pub fn with_opening_quantity(mut self, quantity: i64) -> Self {
        self.opening_quantity = quantity;
        self
    }
}

/// Persistence port for items.
pub trait ItemRows {
    fn item(&mut self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>>;

    fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<InventoryItem>>;

    /// Insert or replace.
    fn save_item(&mut self, item: InventoryItem) -> StoreResult<()>;
}
