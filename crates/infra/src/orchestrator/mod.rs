//! Transaction orchestration.
//!
//! Every state change runs as an [`Operation`] inside one unit of work:
//! validate inputs and status, reserve stock, build and validate journal
//! lines, then commit. Either every row the operation wrote becomes visible or
//! none does.

pub mod error;
pub mod operations;
mod queries;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use tally_accounting::{LedgerStore, PostingEngine};
use tally_core::{Classify, Clock, ErrorKind, SystemClock};
use tally_documents::{BalanceTracker, DocumentNumbering};
use tally_events::{Event, EventBus, EventEnvelope};
use tally_inventory::InventoryGuard;
use tally_parties::PartnerRegistry;

use crate::config::{AccountRoles, CoreConfig};
use crate::retry::RetryPolicy;
use crate::store::{Store, UnitOfWork};

pub use error::OperationError;
pub use operations::{
    CancelDocument, CreateAccount, CreateDraftDocument, CreateInventoryItem,
    CreateInvoiceWithStockDeduction, CreatePurchaseReceipt, DeactivateAccount, DeactivatePartner,
    DeleteDraftDocument, DeleteJournalEntry, DocumentReceipt, InitializeChart, IssueDocument,
    PostJournalEntry, RecordDocumentPayment, RegisterPartner, ReverseJournalEntry,
    UpdateJournalEntry,
};

/// Envelope type published after each commit.
pub type Notification = EventEnvelope<JsonValue>;

/// The stateless domain services an operation may call.
#[derive(Debug, Clone, Default)]
pub struct Services {
    pub ledger: LedgerStore,
    pub engine: PostingEngine,
    pub guard: InventoryGuard,
    pub tracker: BalanceTracker,
    pub partners: PartnerRegistry,
    pub document_numbering: DocumentNumbering,
    pub roles: AccountRoles,
}

impl Services {
    pub fn from_config(config: &CoreConfig) -> Self {
        let ledger = LedgerStore::new();
        let engine = PostingEngine::new(ledger, config.numbering.journal.clone());
        let partners = PartnerRegistry::new(ledger);
        Self {
            ledger,
            guard: InventoryGuard::new(ledger),
            tracker: BalanceTracker::new(engine.clone(), partners),
            engine,
            partners,
            document_numbering: config.numbering.documents.clone(),
            roles: config.accounts.clone(),
        }
    }
}

/// What an operation sees while it runs: the open unit, the services and the
/// operation's timestamp.
pub struct UnitContext<'a, U: ?Sized> {
    pub unit: &'a mut U,
    pub services: &'a Services,
    pub now: DateTime<Utc>,
    events: Vec<Notification>,
}

impl<'a, U: ?Sized> UnitContext<'a, U> {
    pub fn new(unit: &'a mut U, services: &'a Services, now: DateTime<Utc>) -> Self {
        Self {
            unit,
            services,
            now,
            events: Vec::new(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Queue a notification; it is published only if the unit commits.
    pub fn emit<E>(
        &mut self,
        entity_type: &str,
        entity_id: impl Into<Uuid>,
        event: &E,
    ) -> Result<(), OperationError>
    where
        E: Event + Serialize,
    {
        let envelope = EventEnvelope::from_typed(entity_type, entity_id.into(), event)
            .map_err(|e| OperationError::Event(e.to_string()))?;
        self.events.push(envelope);
        Ok(())
    }

    pub fn pending_events(&self) -> &[Notification] {
        &self.events
    }

    fn into_events(self) -> Vec<Notification> {
        self.events
    }
}

/// One named, atomic state change.
///
/// `run` may be called more than once when the commit loses a race, so it
/// must not have effects outside the unit.
pub trait Operation {
    const NAME: &'static str;
    type Output;

    fn run<U>(&self, ctx: &mut UnitContext<'_, U>) -> Result<Self::Output, OperationError>
    where
        U: UnitOfWork + ?Sized;
}

/// Caller-side cancellation. Honoured up to the moment of commit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), OperationError> {
        if self.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs operations against a store and publishes their notifications.
///
/// ## Failure semantics
///
/// - **Domain errors** abort the unit; nothing is written.
/// - **Conflicts** (`ErrorKind::Concurrency`) re-run the whole operation on a
///   fresh unit, up to `RetryPolicy::max_attempts`, with jittered backoff.
/// - **Store unavailable** is returned unchanged and never retried.
/// - **Cancellation** is checked before the unit opens and again right before
///   commit; a cancelled operation has no effect.
/// - **Publish failures** happen after commit: the data is durable and the
///   error is `OperationError::Publish`.
pub struct Orchestrator<S, B> {
    store: S,
    bus: B,
    services: Services,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl<S, B> Orchestrator<S, B>
where
    S: Store,
    B: EventBus<Notification>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self::from_config(store, bus, &CoreConfig::default())
    }

    pub fn from_config(store: S, bus: B, config: &CoreConfig) -> Self {
        Self {
            store,
            bus,
            services: Services::from_config(config),
            retry: config.retry,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn execute<O: Operation>(&self, op: &O) -> Result<O::Output, OperationError> {
        self.execute_cancellable(op, &CancelToken::new())
    }

    pub fn execute_cancellable<O: Operation>(
        &self,
        op: &O,
        cancel: &CancelToken,
    ) -> Result<O::Output, OperationError> {
        let mut attempt = 1;
        loop {
            let span = info_span!("operation", name = O::NAME, attempt);
            let _entered = span.enter();

            match self.attempt(op, cancel) {
                Ok((output, events, commit_sequence)) => {
                    info!(commit_sequence, events = events.len(), "operation committed");
                    self.publish(events, commit_sequence)?;
                    return Ok(output);
                }
                Err(err) if err.kind().is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(error = %err, delay_ms = delay.as_millis() as u64, "write conflict, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.kind() == ErrorKind::Concurrency {
                        warn!(error = %err, "write conflict, giving up");
                    }
                    return Err(err);
                }
            }
        }
    }

    fn attempt<O: Operation>(
        &self,
        op: &O,
        cancel: &CancelToken,
    ) -> Result<(O::Output, Vec<Notification>, u64), OperationError> {
        cancel.check()?;
        let mut unit = self.store.begin()?;

        let mut ctx = UnitContext::new(&mut unit, &self.services, self.clock.now());
        let output = op.run(&mut ctx)?;
        let events = ctx.into_events();

        cancel.check()?;
        let commit_sequence = self.store.commit(unit)?;
        Ok((output, events, commit_sequence))
    }

    fn publish(&self, events: Vec<Notification>, commit_sequence: u64) -> Result<(), OperationError> {
        for event in events {
            self.bus
                .publish(event.with_commit_sequence(commit_sequence))
                .map_err(|e| OperationError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }

    /// Run `f` on a unit that is never committed.
    fn read<T>(
        &self,
        f: impl FnOnce(&mut S::Unit, &Services) -> Result<T, OperationError>,
    ) -> Result<T, OperationError> {
        let mut unit = self.store.begin()?;
        f(&mut unit, &self.services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_tokens_are_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(token.check().is_ok());
        handle.cancel();
        assert_eq!(token.check(), Err(OperationError::Cancelled));
    }

    #[test]
    fn services_follow_configured_numbering() {
        let config = CoreConfig::from_toml_str("[numbering.journal]\nprefix = \"GL\"").unwrap();
        let services = Services::from_config(&config);
        assert_eq!(services.engine.numbering().prefix, "GL");
        assert_eq!(services.tracker.engine().numbering().prefix, "GL");
        assert_eq!(services.roles.sales_revenue, "4000");
    }
}
