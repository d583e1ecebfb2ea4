//! Inventory module: stocked items and the valuation guard.
//!
//! The guard validates whole batches of stock movements before touching any
//! item, and turns quantities into cost-of-goods-sold journal lines. Like the
//! accounting crate it holds no state; rows arrive through [`ItemRows`].

pub mod error;
pub mod events;
pub mod guard;
pub mod item;

#[cfg(test)]
pub(crate) mod testing;

pub use error::InventoryError;
pub use events::{ItemCreated, StockAdjusted, StockEvent};
pub use guard::{InventoryGuard, Reservation, StockLine};
pub use item::{InventoryItem, ItemRows, NewItem, ValuationClass};
