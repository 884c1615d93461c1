//! Runtime core: supervised tasks, the watchdog and the dispatcher.
//!
//! - [`task`]: [`SupervisedTask`] lifecycle (start, force start, safe stop, counters);
//! - [`engine`]: the fixed-delay tick loop behind each task;
//! - [`watchdog`]: reconciliation pass reviving stopped tasks through their policies;
//! - [`dispatcher`]: starts and stops a batch of tasks plus a watchdog;
//! - [`config`]: scheduling knobs and their defaults;
//! - [`shutdown`]: termination signal handling.

mod config;
mod dispatcher;
mod engine;
mod shutdown;
mod task;
mod watchdog;

pub use config::{
    DEFAULT_INITIAL_DELAY, DEFAULT_PARALLELISM, DEFAULT_PERIOD, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_WATCHDOG_PERIOD, TaskConfig, WatchdogConfig,
};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use task::{FailureMode, SupervisedTask, SupervisedTaskBuilder};
pub use watchdog::{WatchId, Watchdog, WatchdogBuilder};
