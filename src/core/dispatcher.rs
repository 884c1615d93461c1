//! # Dispatcher: starts and stops a batch of tasks plus an optional watchdog.
//!
//! ```text
//! Dispatcher::builder(tasks)
//!   .with_watchdog(cfg)        ─► Watchdog over tasks that carry a policy
//!   .with_bus(bus)             ─► watchdog events + subscriber listener
//!   .with_subscribers(subs)    ─► Bus ─► listener ─► SubscriberSet
//!   .build()?
//!
//! start_all():  task[0].start() … task[n].start() ─► watchdog.start()
//! stop_all():   watchdog.safe_stop() ─► every task.safe_stop()
//! ```
//!
//! The watchdog is stopped first so it cannot revive tasks that are being shut
//! down. Tasks publish into whatever bus they were built with; build them with
//! the dispatcher's bus to route their events to the subscribers.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Dispatcher, ProcessFn, RestartPolicy, SupervisedTask, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let task = SupervisedTask::builder(ProcessFn::arc("poll", || async {
//!         Ok::<_, TaskError>(())
//!     }))
//!     .with_restart_policy(RestartPolicy::multiply(3, Duration::from_secs(1))?)
//!     .build();
//!
//!     let dispatcher = Dispatcher::new(vec![task], true)?;
//!     dispatcher.start_all();
//!     dispatcher.stop_all().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::WatchdogConfig;
use crate::core::shutdown;
use crate::core::task::SupervisedTask;
use crate::core::watchdog::Watchdog;
use crate::error::DispatchError;
use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Bus listener forwarding events to the subscriber set.
struct Listener {
    token: CancellationToken,
    join: JoinHandle<()>,
    subs: Arc<SubscriberSet>,
}

impl Listener {
    fn spawn(rt: &tokio::runtime::Handle, bus: &Bus, subs: SubscriberSet) -> Self {
        let token = CancellationToken::new();
        let subs = Arc::new(subs);
        let mut rx = bus.subscribe();

        let join = rt.spawn({
            let token = token.clone();
            let subs = Arc::clone(&subs);
            async move {
                loop {
                    tokio::select! {
                        biased;
                        res = rx.recv() => match res {
                            Ok(ev) => subs.emit(&ev),
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "subscriber listener lagged");
                            }
                            Err(RecvError::Closed) => break,
                        },
                        _ = token.cancelled() => break,
                    }
                }
            }
        });

        Self { token, join, subs }
    }

    /// Stops forwarding after the already published events, then drains subscribers.
    async fn close(self) {
        self.token.cancel();
        let _ = self.join.await;
        match Arc::try_unwrap(self.subs) {
            Ok(set) => set.shutdown().await,
            Err(_) => tracing::debug!("subscriber set still shared, not drained"),
        }
    }
}

/// Starts and stops a fixed batch of tasks and their watchdog.
pub struct Dispatcher {
    tasks: Vec<SupervisedTask>,
    watchdog: Option<Watchdog>,
    bus: Option<Bus>,
    listener: Option<Listener>,
}

impl Dispatcher {
    /// Creates a dispatcher over `tasks`, with a default watchdog when
    /// `watchdog_enabled`.
    ///
    /// Fails with [`DispatchError::AlreadyStarted`] if any task was started before.
    pub fn new(tasks: Vec<SupervisedTask>, watchdog_enabled: bool) -> Result<Self, DispatchError> {
        let builder = Self::builder(tasks);
        if watchdog_enabled {
            builder.with_watchdog(WatchdogConfig::default()).build()
        } else {
            builder.build()
        }
    }

    /// Starts a builder over `tasks` (no watchdog, no bus, no subscribers).
    pub fn builder(tasks: Vec<SupervisedTask>) -> DispatcherBuilder {
        DispatcherBuilder::new(tasks)
    }

    /// Starts every task, then the watchdog. Returns how many tasks started.
    ///
    /// Tasks with `start_enabled = false` are skipped.
    pub fn start_all(&self) -> usize {
        let started = self.tasks.iter().filter(|t| t.start()).count();
        if let Some(wd) = &self.watchdog {
            wd.start();
        }
        tracing::info!(
            started,
            total = self.tasks.len(),
            watchdog = self.watchdog.is_some(),
            "dispatcher started"
        );
        started
    }

    /// Stops the watchdog, then every task (concurrently, each with its own grace).
    pub async fn stop_all(&self) {
        if let Some(wd) = &self.watchdog {
            wd.safe_stop().await;
        }
        join_all(self.tasks.iter().map(|t| t.safe_stop())).await;
        tracing::info!(total = self.tasks.len(), "dispatcher stopped");
    }

    /// Stops everything and drains the subscribers.
    pub async fn shutdown(mut self) {
        self.stop_all().await;
        if let Some(listener) = self.listener.take() {
            listener.close().await;
        }
    }

    /// Starts everything, waits for a termination signal, then shuts down.
    ///
    /// Shuts down even when the signal handler could not be installed, and
    /// returns that error afterwards.
    pub async fn run_until_signal(self) -> std::io::Result<()> {
        self.start_all();
        let res = shutdown::wait_for_shutdown_signal().await;
        if let Err(err) = &res {
            tracing::error!(error = %err, "cannot wait for termination signal");
        }
        self.shutdown().await;
        res
    }

    /// The dispatched tasks, in order.
    pub fn tasks(&self) -> &[SupervisedTask] {
        &self.tasks
    }

    /// The watchdog, if enabled.
    pub fn watchdog(&self) -> Option<&Watchdog> {
        self.watchdog.as_ref()
    }

    /// The event bus, if one was configured (or created for subscribers).
    pub fn bus(&self) -> Option<&Bus> {
        self.bus.as_ref()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(listener) = &self.listener {
            listener.token.cancel();
        }
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    tasks: Vec<SupervisedTask>,
    watchdog: Option<WatchdogConfig>,
    bus: Option<Bus>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a builder over `tasks`.
    pub fn new(tasks: Vec<SupervisedTask>) -> Self {
        Self {
            tasks,
            watchdog: None,
            bus: None,
            subscribers: Vec::new(),
        }
    }

    /// Enables a watchdog with the given configuration.
    pub fn with_watchdog(mut self, config: WatchdogConfig) -> Self {
        self.watchdog = Some(config);
        self
    }

    /// Uses `bus` for watchdog events and the subscriber listener.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Attaches event subscribers; a default bus is created if none was given.
    ///
    /// Requires a Tokio runtime at [`build`](Self::build) time.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the batch and wires the watchdog and subscribers.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        if let Some(task) = self.tasks.iter().find(|t| t.was_started()) {
            return Err(DispatchError::AlreadyStarted {
                task: task.name().to_string(),
            });
        }

        let mut bus = self.bus;
        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let rt =
                tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
            let bus = bus.get_or_insert_with(Bus::default);
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            Some(Listener::spawn(&rt, bus, set))
        };

        let watchdog = self.watchdog.map(|cfg| {
            let wd = Watchdog::builder(self.tasks.iter().cloned(), cfg);
            match &bus {
                Some(bus) => wd.with_bus(bus.clone()).build(),
                None => wd.build(),
            }
        });

        Ok(Dispatcher {
            tasks: self.tasks,
            watchdog,
            bus,
            listener,
        })
    }
}
