//! Change notifications published after a unit of work commits.
//!
//! Domain crates describe what happened as typed [`Event`]s; the orchestrator
//! wraps them in [`EventEnvelope`]s and hands them to an [`EventBus`] only once
//! the store has accepted the commit. Subscribers (UI list refreshes, caches)
//! therefore never observe effects of aborted units.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
