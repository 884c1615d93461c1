//! Lifecycle events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SupervisedTask` (start/stop/failure), the watchdog's
//!   reconciler (restart decisions), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `Dispatcher` listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::{Bus, DEFAULT_BUS_CAPACITY};
pub use event::{Event, EventKind};
