use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::InventoryItemId;
use tally_events::Event;

use crate::item::InventoryItem;

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: InventoryItemId,
    pub sku: String,
    pub opening_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted (positive delta for receipts, negative for sales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub item_id: InventoryItemId,
    pub delta: i64,
    pub available_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    ItemCreated(ItemCreated),
    StockAdjusted(StockAdjusted),
}

impl StockEvent {
    pub fn item_created(item: &InventoryItem, occurred_at: DateTime<Utc>) -> Self {
        StockEvent::ItemCreated(ItemCreated {
            item_id: item.id,
            sku: item.sku.clone(),
            opening_quantity: item.available_quantity,
            occurred_at,
        })
    }

    pub fn stock_adjusted(item: &InventoryItem, delta: i64, occurred_at: DateTime<Utc>) -> Self {
        StockEvent::StockAdjusted(StockAdjusted {
            item_id: item.id,
            delta,
            available_quantity: item.available_quantity,
            occurred_at,
        })
    }

    pub fn item_id(&self) -> InventoryItemId {
        match self {
            StockEvent::ItemCreated(e) => e.item_id,
            StockEvent::StockAdjusted(e) => e.item_id,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::ItemCreated(_) => "inventory.item.created",
            StockEvent::StockAdjusted(_) => "inventory.item.stock_adjusted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::ItemCreated(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}
