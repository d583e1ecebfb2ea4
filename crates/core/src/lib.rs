//! `tally-core`: shared building blocks for the accounting core.
//!
//! Pure primitives only: identifiers, money, error classification and the small
//! ports (clock, sequences) that the component crates consume. No IO lives here.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod sequence;
pub mod value_object;
pub mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{Classify, ErrorKind, StoreError, StoreResult};
pub use id::{AccountId, DocumentId, InventoryItemId, JournalEntryId, PartnerId};
pub use money::{Money, Percent};
pub use sequence::{Sequences, format_number};
pub use value_object::ValueObject;
pub use version::ExpectedVersion;
