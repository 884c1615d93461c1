//! # tickvisor
//!
//! **Tickvisor** runs async units of work on a fixed-delay interval, counts their
//! successful and total ticks, and revives the ones that crash according to a
//! restart policy.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//!     │  SupervisedTask  │   │  SupervisedTask  │   │  SupervisedTask  │
//!     │ (policy: Some)   │   │ (policy: Some)   │   │ (policy: None)   │
//!     └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!              │ tick loop             │ tick loop            │ tick loop
//!              ▼                       ▼                      ▼
//!        fail → stop, wait       fail → stop, wait      fail → dead for good
//!              ▲                       ▲
//!              │ force_start()         │ force_start()
//! ┌────────────┴───────────────────────┴──────────────────────────────┐
//! │  Watchdog (itself a SupervisedTask, no policy)                    │
//! │  - watched tasks (only those with a RestartPolicy), by WatchId    │
//! │  - next-restart table: WatchId → Option<Instant>                  │
//! │  - each pass: stopped && window elapsed → policy.next_start_time  │
//! └───────────────────────────────────────────────────────────────────┘
//!              ▲
//!              │ start_all(): tasks, then watchdog
//!              │ stop_all():  watchdog, then tasks
//! ┌────────────┴──────────────────────────────────────────────────────┐
//! │  Dispatcher  (+ optional Bus ─► listener ─► SubscriberSet)        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle of one task
//! ```text
//! force_start()
//!   └─► sleep(initial_delay)
//!       loop {
//!         ├─► total += 1
//!         ├─► process()
//!         │     ├─ Ok          ─► success += 1
//!         │     └─ Err / panic ─► TickFailed
//!         │                        ├─ no policy ─► TaskDied, engine shut down
//!         │                        └─ policy    ─► TaskSuspended, engine shut down
//!         └─► sleep(period)  (safe_stop observed here)
//!       }
//! ```
//!
//! ### Restart delays
//! | Variant            | delay(k, base)                     |
//! |--------------------|------------------------------------|
//! | `Constant`         | base                               |
//! | `Multiply`         | base × k                           |
//! | `TimelineSeconds`  | list[(k − 1) mod len] seconds      |
//! | `Ln`               | ln(base_ms × k) ms                 |
//! | `Exp`              | e^(base_ms × k) ms                 |
//! | `Pow`              | base_ms ^ k ms                     |
//! | `Pow2`             | (base_ms × k)² ms                  |
//!
//! ## Features
//! | Area             | Description                                           | Key types / traits                         |
//! |------------------|-------------------------------------------------------|--------------------------------------------|
//! | **Tasks**        | Periodic units of work with counters and a start latch | [`SupervisedTask`], [`Process`], [`ProcessFn`] |
//! | **Policies**     | Attempt budget and delay family for revivals          | [`RestartPolicy`], [`Delay`]               |
//! | **Supervision**  | Revive crashed tasks, start/stop batches              | [`Watchdog`], [`Dispatcher`]               |
//! | **Events**       | Lifecycle events and subscribers                      | [`Event`], [`Bus`], [`Subscribe`], [`LogWriter`] |
//! | **Errors**       | Typed configuration and tick errors                   | [`PolicyError`], [`TaskError`]             |
//! | **Time**         | Injectable clock for deterministic tests              | [`Clock`], [`ManualClock`]                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tickvisor::{
//!     Dispatcher, ProcessFn, RestartPolicy, SupervisedTask, TaskConfig, TaskError, WatchdogConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let calls = Arc::new(AtomicU32::new(0));
//!     let seen = calls.clone();
//!
//!     // Fails once, then keeps succeeding.
//!     let task = SupervisedTask::builder(ProcessFn::arc("flaky", move || {
//!         let n = seen.fetch_add(1, Ordering::Relaxed);
//!         async move {
//!             if n == 0 { Err(TaskError::fail("first tick fails")) } else { Ok(()) }
//!         }
//!     }))
//!     .with_config(TaskConfig::default().with_initial_delay(Duration::from_millis(10)))
//!     .with_restart_policy(RestartPolicy::constant(3, Duration::from_millis(50))?)
//!     .build();
//!
//!     let dispatcher = Dispatcher::builder(vec![task.clone()])
//!         .with_watchdog(WatchdogConfig::every(Duration::from_millis(20)))
//!         .build()?;
//!
//!     dispatcher.start_all();
//!     tokio::time::sleep(Duration::from_millis(300)).await;
//!     dispatcher.stop_all().await;
//!
//!     assert!(task.successful_process_count() >= 1);
//!     assert_eq!(task.restart_policy().map(|p| p.current_attempt()), Some(1));
//!     Ok(())
//! }
//! ```
mod clock;
mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use clock::{Clock, ManualClock, TokioClock};
pub use core::{
    DEFAULT_INITIAL_DELAY, DEFAULT_PARALLELISM, DEFAULT_PERIOD, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_WATCHDOG_PERIOD, Dispatcher, DispatcherBuilder, FailureMode, SupervisedTask,
    SupervisedTaskBuilder, TaskConfig, WatchId, Watchdog, WatchdogBuilder, WatchdogConfig,
};
pub use error::{DispatchError, PolicyError, StartError, TaskError};
pub use events::{Bus, DEFAULT_BUS_CAPACITY, Event, EventKind};
pub use policies::{DEFAULT_BASE_DURATION, DEFAULT_MAX_ATTEMPTS, Delay, MAX_DELAY, RestartPolicy};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Process, ProcessFn, ProcessRef};
