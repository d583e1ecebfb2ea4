use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_accounting::{AccountRows, AccountType, LedgerError, LedgerStore};
use tally_core::{AccountId, Entity, Money, PartnerId, StoreResult};

use crate::error::PartnerError;

/// Customer or vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerKind {
    Customer,
    Vendor,
}

impl PartnerKind {
    /// Type the linked control account must have.
    pub fn control_account_type(self) -> AccountType {
        match self {
            PartnerKind::Customer => AccountType::Asset,
            PartnerKind::Vendor => AccountType::Liability,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPartner {
    pub id: PartnerId,
    pub kind: PartnerKind,
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    /// Receivable account for customers, payable account for vendors.
    pub account_id: AccountId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for BusinessPartner {
    type Id = PartnerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPartner {
    pub kind: PartnerKind,
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    pub account_id: AccountId,
}

impl NewPartner {
    pub fn customer(name: impl Into<String>, receivable: AccountId) -> Self {
        Self {
            kind: PartnerKind::Customer,
            name: name.into(),
            contact: ContactInfo::default(),
            account_id: receivable,
        }
    }

    pub fn vendor(name: impl Into<String>, payable: AccountId) -> Self {
        Self {
            kind: PartnerKind::Vendor,
            name: name.into(),
            contact: ContactInfo::default(),
            account_id: payable,
        }
    }

    pub fn with_contact(mut self, contact: ContactInfo) -> Self {
        self.contact = contact;
        self
    }
}

/// Persistence port for partners.
pub trait PartnerRows {
    fn partner(&mut self, id: PartnerId) -> StoreResult<Option<BusinessPartner>>;

    /// Insert or replace.
    fn save_partner(&mut self, partner: BusinessPartner) -> StoreResult<()>;
}

/// Anything that leaves money open against a partner.
pub trait OpenBalance {
    fn partner_id(&self) -> PartnerId;

    /// Amount still owed; zero when settled or void.
    fn open_balance(&self) -> Money;
}

/// Partner balance next to its control account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub partner_id: PartnerId,
    pub account_id: AccountId,
    pub outstanding: Money,
    pub ledger_balance: Money,
}

impl Reconciliation {
    /// `ledger_balance - outstanding`. Only meaningful when the control account
    /// is dedicated to this partner.
    pub fn difference(&self) -> Money {
        self.ledger_balance - self.outstanding
    }

    pub fn is_consistent(&self) -> bool {
        self.difference().is_zero()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PartnerRegistry {
    ledger: LedgerStore,
}

impl PartnerRegistry {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    pub fn register<R>(
        &self,
        rows: &mut R,
        new: NewPartner,
        now: DateTime<Utc>,
    ) -> Result<BusinessPartner, PartnerError>
    where
        R: PartnerRows + AccountRows + ?Sized,
    {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(PartnerError::InvalidPartner("name cannot be empty".to_string()));
        }

        let account = match self.ledger.account(rows, new.account_id) {
            Ok(account) => account,
            Err(LedgerError::UnknownAccount(id)) => {
                return Err(PartnerError::InvalidAccount {
                    account_id: id,
                    reason: "account does not exist".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let expected = new.kind.control_account_type();
        if account.account_type != expected {
            return Err(PartnerError::InvalidAccount {
                account_id: account.id,
                reason: format!("expected a {expected:?} account, found {:?}", account.account_type),
            });
        }
        if !account.active {
            return Err(PartnerError::InvalidAccount {
                account_id: account.id,
                reason: "account is inactive".to_string(),
            });
        }

        let partner = BusinessPartner {
            id: PartnerId::new(),
            kind: new.kind,
            name: name.to_string(),
            contact: new.contact,
            account_id: account.id,
            active: true,
            created_at: now,
        };
        rows.save_partner(partner.clone())?;

        debug!(partner_id = %partner.id, kind = ?partner.kind, "partner registered");
        Ok(partner)
    }

    pub fn partner<R>(&self, rows: &mut R, id: PartnerId) -> Result<BusinessPartner, PartnerError>
    where
        R: PartnerRows + ?Sized,
    {
        rows.partner(id)?.ok_or(PartnerError::PartnerNotFound(id))
    }

    /// Like [`partner`](Self::partner), but also rejects inactive partners.
    pub fn active_partner<R>(&self, rows: &mut R, id: PartnerId) -> Result<BusinessPartner, PartnerError>
    where
        R: PartnerRows + ?Sized,
    {
        let partner = self.partner(rows, id)?;
        if !partner.active {
            return Err(PartnerError::InactivePartner(id));
        }
        Ok(partner)
    }

    /// Deactivation is refused while documents are still open.
    pub fn deactivate<'a, R, D>(
        &self,
        rows: &mut R,
        id: PartnerId,
        documents: impl IntoIterator<Item = &'a D>,
    ) -> Result<BusinessPartner, PartnerError>
    where
        R: PartnerRows + ?Sized,
        D: OpenBalance + 'a,
    {
        let mut partner = self.partner(rows, id)?;
        let outstanding = Self::outstanding_balance(id, documents);
        if !outstanding.is_zero() {
            return Err(PartnerError::OpenBalance {
                partner_id: id,
                outstanding,
            });
        }
        if partner.active {
            partner.active = false;
            rows.save_partner(partner.clone())?;
        }
        Ok(partner)
    }

    /// Sum of open balances of the partner's documents.
    pub fn outstanding_balance<'a, D>(
        partner_id: PartnerId,
        documents: impl IntoIterator<Item = &'a D>,
    ) -> Money
    where
        D: OpenBalance + 'a,
    {
        documents
            .into_iter()
            .filter(|d| d.partner_id() == partner_id)
            .map(|d| d.open_balance())
            .sum()
    }

    pub fn reconcile<'a, R, D>(
        &self,
        rows: &mut R,
        partner_id: PartnerId,
        documents: impl IntoIterator<Item = &'a D>,
    ) -> Result<Reconciliation, PartnerError>
    where
        R: PartnerRows + AccountRows + ?Sized,
        D: OpenBalance + 'a,
    {
        let partner = self.partner(rows, partner_id)?;
        let ledger_balance = self.ledger.get_balance(rows, partner.account_id)?;
        Ok(Reconciliation {
            partner_id,
            account_id: partner.account_id,
            outstanding: Self::outstanding_balance(partner_id, documents),
            ledger_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tally_accounting::{Account, NewAccount};

    #[derive(Default)]
    struct Rows {
        accounts: HashMap<AccountId, Account>,
        partners: HashMap<PartnerId, BusinessPartner>,
    }

    impl AccountRows for Rows {
        fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
            Ok(self.accounts.get(&id).cloned())
        }

        fn account_by_code(&mut self, code: &str) -> StoreResult<Option<Account>> {
            Ok(self.accounts.values().find(|a| a.code == code).cloned())
        }

        fn accounts(&mut self) -> StoreResult<Vec<Account>> {
            Ok(self.accounts.values().cloned().collect())
        }

        fn save_account(&mut self, account: Account) -> StoreResult<()> {
            self.accounts.insert(account.id, account);
            Ok(())
        }
    }

    impl PartnerRows for Rows {
        fn partner(&mut self, id: PartnerId) -> StoreResult<Option<BusinessPartner>> {
            Ok(self.partners.get(&id).cloned())
        }

        fn save_partner(&mut self, partner: BusinessPartner) -> StoreResult<()> {
            self.partners.insert(partner.id, partner);
            Ok(())
        }
    }

    struct Open(PartnerId, i64);

    impl OpenBalance for Open {
        fn partner_id(&self) -> PartnerId {
            self.0
        }

        fn open_balance(&self) -> Money {
            Money::from_minor(self.1)
        }
    }

    fn open_account(rows: &mut Rows, code: &str, account_type: AccountType) -> AccountId {
        LedgerStore
            .create_account(rows, NewAccount::new(code, code, account_type), Utc::now())
            .unwrap()
            .id
    }

    #[test]
    fn customers_need_a_receivable_account() {
        let mut rows = Rows::default();
        let payable = open_account(&mut rows, "2000", AccountType::Liability);

        let err = PartnerRegistry::default()
            .register(&mut rows, NewPartner::customer("Acme", payable), Utc::now())
            .unwrap_err();

        assert!(matches!(err, PartnerError::InvalidAccount { account_id, .. } if account_id == payable));
    }

    #[test]
    fn outstanding_balance_sums_only_own_documents() {
        let mut rows = Rows::default();
        let receivable = open_account(&mut rows, "1200", AccountType::Asset);
        let registry = PartnerRegistry::default();
        let acme = registry
            .register(&mut rows, NewPartner::customer("Acme", receivable), Utc::now())
            .unwrap();
        let other = PartnerId::new();

        let docs = [Open(acme.id, 1_000), Open(other, 5_000), Open(acme.id, 250)];
        assert_eq!(
            PartnerRegistry::outstanding_balance(acme.id, &docs),
            Money::from_minor(1_250)
        );

        LedgerStore
            .post_balance_delta(&mut rows, receivable, Money::from_minor(1_250))
            .unwrap();
        let rec = registry.reconcile(&mut rows, acme.id, &docs).unwrap();
        assert!(rec.is_consistent());
    }

    #[test]
    fn partners_with_open_documents_stay_active() {
        let mut rows = Rows::default();
        let payable = open_account(&mut rows, "2000", AccountType::Liability);
        let registry = PartnerRegistry::default();
        let vendor = registry
            .register(&mut rows, NewPartner::vendor("Supplies Ltd", payable), Utc::now())
            .unwrap();

        let err = registry
            .deactivate(&mut rows, vendor.id, &[Open(vendor.id, 10)])
            .unwrap_err();
        assert!(matches!(err, PartnerError::OpenBalance { .. }));

        let none: [Open; 0] = [];
        registry.deactivate(&mut rows, vendor.id, &none).unwrap();
        assert_eq!(
            registry.active_partner(&mut rows, vendor.id).unwrap_err(),
            PartnerError::InactivePartner(vendor.id)
        );
    }
}
