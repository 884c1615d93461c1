//! # Event subscribers.
//!
//! - [`Subscribe`] extension trait for lifecycle event handlers
//! - [`SubscriberSet`] non-blocking fan-out with per-subscriber queues
//! - [`LogWriter`] built-in subscriber that logs through `tracing`

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
