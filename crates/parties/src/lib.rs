//! Parties module: customers and vendors.
//!
//! A partner links to the receivable or payable account its documents settle
//! against. What a partner owes (or is owed) is never stored; it is computed
//! from open document balances.

pub mod error;
pub mod events;
pub mod partner;

pub use error::PartnerError;
pub use events::{PartnerDeactivated, PartnerEvent, PartnerRegistered};
pub use partner::{
    BusinessPartner, ContactInfo, NewPartner, OpenBalance, PartnerKind, PartnerRegistry,
    PartnerRows, Reconciliation,
};
