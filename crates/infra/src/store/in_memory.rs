use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::debug;

use tally_accounting::{Account, AccountRows, JournalEntry, JournalRows};
use tally_core::{
    AccountId, DocumentId, Entity, ExpectedVersion, InventoryItemId, JournalEntryId, PartnerId,
    Sequences, StoreError, StoreResult,
};
use tally_documents::{BusinessDocument, DocumentKind, DocumentRows};
use tally_inventory::{InventoryItem, ItemRows};
use tally_parties::{BusinessPartner, PartnerRows};

use super::Store;

#[derive(Debug)]
struct Row<E> {
    /// Commit sequence of the last write.
    version: u64,
    value: E,
}

/// Rows of one entity type plus their natural-key index.
#[derive(Debug)]
struct Table<E: Entity> {
    rows: HashMap<E::Id, Row<E>>,
    keys: HashMap<String, E::Id>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            keys: HashMap::new(),
        }
    }
}

impl<E: Entity + Clone> Table<E> {
    /// `0` when the row does not exist.
    fn version_of(&self, id: &E::Id) -> u64 {
        self.rows.get(id).map_or(0, |r| r.version)
    }

    fn upsert(&mut self, value: E, version: u64) {
        let id = value.id().clone();
        if let Some(old_key) = self.rows.get(&id).and_then(|r| r.value.natural_key()) {
            self.keys.remove(&old_key);
        }
        if let Some(key) = value.natural_key() {
            self.keys.insert(key, id.clone());
        }
        self.rows.insert(id, Row { version, value });
    }

    fn remove(&mut self, id: &E::Id) {
        if let Some(row) = self.rows.remove(id) {
            if let Some(key) = row.value.natural_key() {
                self.keys.remove(&key);
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    accounts: Table<Account>,
    entries: Table<JournalEntry>,
    items: Table<InventoryItem>,
    documents: Table<BusinessDocument>,
    partners: Table<BusinessPartner>,
    sequences: HashMap<String, u64>,
    commit_sequence: u64,
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

fn poisoned() -> StoreError {
    StoreError::unavailable("in-memory store lock poisoned")
}

fn ensure_available(shared: &Shared) -> StoreResult<()> {
    if shared.available.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(StoreError::unavailable("in-memory store is offline"))
    }
}

fn read_tables(shared: &Shared) -> StoreResult<RwLockReadGuard<'_, Tables>> {
    ensure_available(shared)?;
    shared.tables.read().map_err(|_| poisoned())
}

/// In-memory transactional store with optimistic concurrency.
///
/// Intended for tests/dev and for embedding. Clones share the same data.
///
/// ## Isolation
///
/// Units read committed rows under a short read lock and remember the version
/// of every row they saw. Writes are buffered in the unit. `commit` takes the
/// write lock, checks the remembered versions (and the unique keys of written
/// rows) and applies the buffer; only `commit` ever holds the write lock.
///
/// Versions are the store-wide commit sequence of the last write, so a row
/// that is deleted and re-created never reuses a version.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the backing storage going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Sequence number of the last successful commit.
    pub fn last_commit(&self) -> StoreResult<u64> {
        Ok(read_tables(&self.shared)?.commit_sequence)
    }
}

impl Store for InMemoryStore {
    type Unit = InMemoryUnit;

    fn begin(&self) -> StoreResult<InMemoryUnit> {
        ensure_available(&self.shared)?;
        Ok(InMemoryUnit {
            shared: Arc::clone(&self.shared),
            accounts: Staged::default(),
            entries: Staged::default(),
            items: Staged::default(),
            documents: Staged::default(),
            partners: Staged::default(),
            sequences: StagedSequences::default(),
        })
    }

    fn commit(&self, unit: InMemoryUnit) -> StoreResult<u64> {
        if !Arc::ptr_eq(&self.shared, &unit.shared) {
            return Err(StoreError::unavailable("unit was started on another store"));
        }
        ensure_available(&self.shared)?;
        let mut tables = self.shared.tables.write().map_err(|_| poisoned())?;

        unit.accounts.validate(&tables.accounts, "account")?;
        unit.entries.validate(&tables.entries, "journal entry")?;
        unit.items.validate(&tables.items, "inventory item")?;
        unit.documents.validate(&tables.documents, "document")?;
        unit.partners.validate(&tables.partners, "partner")?;
        unit.sequences.validate(&tables.sequences)?;

        tables.commit_sequence += 1;
        let version = tables.commit_sequence;

        let InMemoryUnit {
            accounts,
            entries,
            items,
            documents,
            partners,
            sequences,
            ..
        } = unit;
        let written = accounts.len() + entries.len() + items.len() + documents.len() + partners.len();
        accounts.apply(&mut tables.accounts, version);
        entries.apply(&mut tables.entries, version);
        items.apply(&mut tables.items, version);
        documents.apply(&mut tables.documents, version);
        partners.apply(&mut tables.partners, version);
        sequences.apply(&mut tables.sequences);

        debug!(commit_sequence = version, rows = written, "unit committed");
        Ok(version)
    }
}

/// Read-set and write buffer of one entity type inside a unit.
struct Staged<E: Entity> {
    read: HashMap<E::Id, u64>,
    /// `None` marks a removal.
    writes: HashMap<E::Id, Option<E>>,
}

impl<E: Entity> Default for Staged<E> {
    fn default() -> Self {
        Self {
            read: HashMap::new(),
            writes: HashMap::new(),
        }
    }
}

impl<E: Entity + Clone> Staged<E> {
    fn get(&mut self, table: &Table<E>, id: &E::Id) -> Option<E> {
        if let Some(staged) = self.writes.get(id) {
            return staged.clone();
        }
        let row = table.rows.get(id);
        self.read
            .entry(id.clone())
            .or_insert_with(|| row.map_or(0, |r| r.version));
        row.map(|r| r.value.clone())
    }

    fn get_by_key(&mut self, table: &Table<E>, key: &str) -> Option<E> {
        let staged = self
            .writes
            .values()
            .flatten()
            .find(|e| e.natural_key().as_deref() == Some(key))
            .cloned();
        if staged.is_some() {
            return staged;
        }
        let id = table.keys.get(key)?.clone();
        self.get(table, &id)
    }

    fn all(&mut self, table: &Table<E>) -> Vec<E> {
        let mut out = Vec::with_capacity(table.rows.len());
        for (id, row) in &table.rows {
            if self.writes.contains_key(id) {
                continue;
            }
            self.read.entry(id.clone()).or_insert(row.version);
            out.push(row.value.clone());
        }
        out.extend(self.writes.values().flatten().cloned());
        out
    }

    fn put(&mut self, value: E) {
        self.writes.insert(value.id().clone(), Some(value));
    }

    fn remove(&mut self, id: &E::Id) {
        self.writes.insert(id.clone(), None);
    }

    fn len(&self) -> usize {
        self.writes.len()
    }

    fn validate(&self, table: &Table<E>, what: &str) -> StoreResult<()> {
        for (id, seen) in &self.read {
            ExpectedVersion::Exact(*seen).check(format!("{what} {id:?}"), table.version_of(id))?;
        }

        for (id, write) in &self.writes {
            let Some(key) = write.as_ref().and_then(|e| e.natural_key()) else {
                continue;
            };
            if let Some(owner) = table.keys.get(&key) {
                let released = matches!(self.writes.get(owner), Some(None));
                if owner != id && !released {
                    return Err(StoreError::conflict(format!("{what} key '{key}' is already taken")));
                }
            }
        }
        Ok(())
    }

    fn apply(self, table: &mut Table<E>, version: u64) {
        // Removals first, so a key released by this unit can be claimed by it.
        let (removals, upserts): (Vec<_>, Vec<_>) =
            self.writes.into_iter().partition(|(_, w)| w.is_none());
        for (id, _) in removals {
            table.remove(&id);
        }
        for value in upserts.into_iter().filter_map(|(_, w)| w) {
            table.upsert(value, version);
        }
    }
}

#[derive(Default)]
struct StagedSequences {
    read: HashMap<String, u64>,
    next: HashMap<String, u64>,
}

impl StagedSequences {
    fn validate(&self, committed: &HashMap<String, u64>) -> StoreResult<()> {
        for (series, seen) in &self.read {
            let current = committed.get(series).copied().unwrap_or(0);
            ExpectedVersion::Exact(*seen).check(format!("sequence '{series}'"), current)?;
        }
        Ok(())
    }

    fn apply(self, committed: &mut HashMap<String, u64>) {
        committed.extend(self.next);
    }
}

/// A unit of work on an [`InMemoryStore`]. Dropping it discards its writes.
pub struct InMemoryUnit {
    shared: Arc<Shared>,
    accounts: Staged<Account>,
    entries: Staged<JournalEntry>,
    items: Staged<InventoryItem>,
    documents: Staged<BusinessDocument>,
    partners: Staged<BusinessPartner>,
    sequences: StagedSequences,
}

impl core::fmt::Debug for InMemoryUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryUnit")
            .field("accounts", &self.accounts.len())
            .field("entries", &self.entries.len())
            .field("items", &self.items.len())
            .field("documents", &self.documents.len())
            .field("partners", &self.partners.len())
            .finish_non_exhaustive()
    }
}

impl AccountRows for InMemoryUnit {
    fn account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.accounts.get(&tables.accounts, &id))
    }

    fn account_by_code(&mut self, code: &str) -> StoreResult<Option<Account>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.accounts.get_by_key(&tables.accounts, code))
    }

    fn accounts(&mut self) -> StoreResult<Vec<Account>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.accounts.all(&tables.accounts))
    }

    fn save_account(&mut self, account: Account) -> StoreResult<()> {
        self.accounts.put(account);
        Ok(())
    }
}

impl JournalRows for InMemoryUnit {
    fn entry(&mut self, id: JournalEntryId) -> StoreResult<Option<JournalEntry>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.entries.get(&tables.entries, &id))
    }

    fn entry_by_number(&mut self, number: &str) -> StoreResult<Option<JournalEntry>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.entries.get_by_key(&tables.entries, number))
    }

    fn save_entry(&mut self, entry: JournalEntry) -> StoreResult<()> {
        self.entries.put(entry);
        Ok(())
    }

    fn remove_entry(&mut self, id: JournalEntryId) -> StoreResult<()> {
        self.entries.remove(&id);
        Ok(())
    }
}

impl ItemRows for InMemoryUnit {
    fn item(&mut self, id: InventoryItemId) -> StoreResult<Option<InventoryItem>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.items.get(&tables.items, &id))
    }

    fn item_by_sku(&mut self, sku: &str) -> StoreResult<Option<InventoryItem>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.items.get_by_key(&tables.items, sku))
    }

    fn save_item(&mut self, item: InventoryItem) -> StoreResult<()> {
        self.items.put(item);
        Ok(())
    }
}

impl DocumentRows for InMemoryUnit {
    fn document(&mut self, id: DocumentId) -> StoreResult<Option<BusinessDocument>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.documents.get(&tables.documents, &id))
    }

    fn document_by_number(
        &mut self,
        kind: DocumentKind,
        number: &str,
    ) -> StoreResult<Option<BusinessDocument>> {
        let tables = read_tables(&self.shared)?;
        Ok(self
            .documents
            .get_by_key(&tables.documents, &format!("{kind}:{number}")))
    }

    fn documents(&mut self) -> StoreResult<Vec<BusinessDocument>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.documents.all(&tables.documents))
    }

    fn save_document(&mut self, document: BusinessDocument) -> StoreResult<()> {
        self.documents.put(document);
        Ok(())
    }

    fn remove_document(&mut self, id: DocumentId) -> StoreResult<()> {
        self.documents.remove(&id);
        Ok(())
    }
}

impl PartnerRows for InMemoryUnit {
    fn partner(&mut self, id: PartnerId) -> StoreResult<Option<BusinessPartner>> {
        let tables = read_tables(&self.shared)?;
        Ok(self.partners.get(&tables.partners, &id))
    }

    fn save_partner(&mut self, partner: BusinessPartner) -> StoreResult<()> {
        self.partners.put(partner);
        Ok(())
    }
}

impl Sequences for InMemoryUnit {
    fn next_value(&mut self, series: &str) -> StoreResult<u64> {
        let value = match self.sequences.next.get(series) {
            Some(current) => current + 1,
            None => {
                let tables = read_tables(&self.shared)?;
                let current = tables.sequences.get(series).copied().unwrap_or(0);
                self.sequences.read.insert(series.to_string(), current);
                current + 1
            }
        };
        self.sequences.next.insert(series.to_string(), value);
        Ok(value)
    }
}
