use thiserror::Error;

use tally_accounting::LedgerError;
use tally_core::{Classify, ErrorKind, InventoryItemId, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("inventory item {0} not found")]
    ItemNotFound(InventoryItemId),

    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: InventoryItemId,
        requested: i64,
        available: i64,
    },

    #[error("invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: InventoryItemId, quantity: i64 },

    #[error("sku '{0}' already exists")]
    DuplicateSku(String),

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid valuation class: {0}")]
    InvalidValuationClass(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for InventoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::InvalidQuantity { .. }
            | InventoryError::DuplicateSku(_)
            | InventoryError::InvalidItem(_)
            | InventoryError::InvalidValuationClass(_)
            | InventoryError::AmountOverflow => ErrorKind::Validation,
            InventoryError::ItemNotFound(_) | InventoryError::InsufficientStock { .. } => {
                ErrorKind::StateConflict
            }
            InventoryError::Ledger(e) => e.kind(),
            InventoryError::Store(e) => e.kind(),
        }
    }
}
