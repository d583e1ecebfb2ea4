//! Infrastructure layer: transactional store, orchestration, config.
//!
//! The domain crates describe single-component rules against row ports. This
//! crate supplies the store those ports run on and the [`Orchestrator`] that
//! strings components together into atomic, retried, cancellable operations.

pub mod config;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use config::CoreConfig;
pub use orchestrator::{CancelToken, Notification, Operation, OperationError, Orchestrator, Services, UnitContext};
pub use retry::RetryPolicy;
pub use store::{InMemoryStore, InMemoryUnit, Store, UnitOfWork};
