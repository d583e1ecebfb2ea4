use thiserror::Error;

use tally_accounting::LedgerError;
use tally_core::{AccountId, Classify, ErrorKind, Money, PartnerId, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartnerError {
    #[error("partner {0} not found")]
    PartnerNotFound(PartnerId),

    #[error("partner {0} is inactive")]
    InactivePartner(PartnerId),

    #[error("invalid partner: {0}")]
    InvalidPartner(String),

    #[error("account {account_id} cannot be used: {reason}")]
    InvalidAccount { account_id: AccountId, reason: String },

    #[error("partner {partner_id} still has {outstanding} outstanding")]
    OpenBalance { partner_id: PartnerId, outstanding: Money },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for PartnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            PartnerError::InvalidPartner(_) | PartnerError::InvalidAccount { .. } => {
                ErrorKind::Validation
            }
            PartnerError::PartnerNotFound(_)
            | PartnerError::InactivePartner(_)
            | PartnerError::OpenBalance { .. } => ErrorKind::StateConflict,
            PartnerError::Ledger(e) => e.kind(),
            PartnerError::Store(e) => e.kind(),
        }
    }
}
