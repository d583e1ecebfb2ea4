use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, PartnerId};
use tally_events::Event;

use crate::partner::{BusinessPartner, PartnerKind};

/// Event: PartnerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRegistered {
    pub partner_id: PartnerId,
    pub kind: PartnerKind,
    pub name: String,
    pub account_id: AccountId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartnerDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerDeactivated {
    pub partner_id: PartnerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerEvent {
    PartnerRegistered(PartnerRegistered),
    PartnerDeactivated(PartnerDeactivated),
}

impl PartnerEvent {
    pub fn registered(partner: &BusinessPartner, occurred_at: DateTime<Utc>) -> Self {
        PartnerEvent::PartnerRegistered(PartnerRegistered {
            partner_id: partner.id,
            kind: partner.kind,
            name: partner.name.clone(),
            account_id: partner.account_id,
            occurred_at,
        })
    }

    pub fn deactivated(partner: &BusinessPartner, occurred_at: DateTime<Utc>) -> Self {
        PartnerEvent::PartnerDeactivated(PartnerDeactivated {
            partner_id: partner.id,
            occurred_at,
        })
    }
}

impl Event for PartnerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartnerEvent::PartnerRegistered(_) => "parties.partner.registered",
            PartnerEvent::PartnerDeactivated(_) => "parties.partner.deactivated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartnerEvent::PartnerRegistered(e) => e.occurred_at,
            PartnerEvent::PartnerDeactivated(e) => e.occurred_at,
        }
    }
}
