//! # SupervisedTask: a periodically ticking unit of work.
//!
//! A [`SupervisedTask`] owns one execution [`Engine`], the success/total tick
//! counters, a one-way `started` latch and an optional [`RestartPolicy`].
//!
//! ## State machine
//! ```text
//!   New ──start()/force_start()──► Running ──tick fails / safe_stop()──► Stopped
//!                                     ▲                                    │
//!                                     └──────────── force_start() ─────────┘
//!                                                  (usually by a Watchdog)
//! ```
//!
//! ## Rules
//! - `was_started()` is a latch: once true it never reverts.
//! - `total_process_count() >= successful_process_count()`.
//! - A failing tick never escapes the loop. Without a policy the task is dead for
//!   good ([`FailureMode::Kill`]); with one it waits for a watchdog
//!   ([`FailureMode::AwaitRevival`]).
//! - `is_stopped()` is the engine's shutdown flag: a task that was never started
//!   is *not* stopped.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{ProcessFn, SupervisedTask, TaskConfig, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let task = SupervisedTask::builder(ProcessFn::arc("heartbeat", || async {
//!         Ok::<_, TaskError>(())
//!     }))
//!     .with_config(TaskConfig::default().with_initial_delay(Duration::from_millis(10)))
//!     .build();
//!
//!     assert!(task.start());
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     task.safe_stop().await;
//!
//!     assert!(task.is_stopped());
//!     assert!(task.successful_process_count() >= 1);
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time;

use crate::core::config::TaskConfig;
use crate::core::engine::{Engine, LoopExit};
use crate::error::StartError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RestartPolicy;
use crate::tasks::ProcessRef;

/// What a failing tick does to its task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureMode {
    /// No restart policy: the task stops permanently.
    Kill,
    /// A restart policy exists: the task stops and waits for a watchdog.
    AwaitRevival,
}

/// State shared between the task handle and its tick loop.
pub(crate) struct TaskInner {
    pub(crate) process: ProcessRef,
    pub(crate) config: TaskConfig,
    pub(crate) policy: Option<Arc<RestartPolicy>>,
    pub(crate) failure_mode: FailureMode,
    pub(crate) started: AtomicBool,
    pub(crate) success: AtomicU64,
    pub(crate) total: AtomicU64,
    pub(crate) engine: Mutex<Engine>,
    pub(crate) bus: Option<Bus>,
}

impl TaskInner {
    pub(crate) fn name(&self) -> &str {
        self.process.name()
    }

    pub(crate) fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Detached loop handle owned by an in-progress `safe_stop`.
///
/// On drop (loop exited, or `safe_stop` itself cancelled) the loop is aborted and
/// the engine may be replaced again.
struct Drain<'a> {
    inner: &'a TaskInner,
    join: JoinHandle<LoopExit>,
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        self.join.abort();
        self.inner.lock_engine().set_draining(false);
    }
}

/// Handle to a periodically ticking, optionally restartable unit of work.
///
/// Cheap to clone; all clones drive the same task.
#[derive(Clone)]
pub struct SupervisedTask {
    inner: Arc<TaskInner>,
}

impl SupervisedTask {
    /// Creates a task from its unit of work, scheduling config and optional policy.
    pub fn new(
        process: ProcessRef,
        config: TaskConfig,
        policy: Option<Arc<RestartPolicy>>,
    ) -> Self {
        Self::from_parts(process, config, policy, None)
    }

    /// Starts a builder for `process` with default config and no policy.
    pub fn builder(process: ProcessRef) -> SupervisedTaskBuilder {
        SupervisedTaskBuilder::new(process)
    }

    fn from_parts(
        process: ProcessRef,
        config: TaskConfig,
        policy: Option<Arc<RestartPolicy>>,
        bus: Option<Bus>,
    ) -> Self {
        let failure_mode = if policy.is_some() {
            FailureMode::AwaitRevival
        } else {
            FailureMode::Kill
        };
        Self {
            inner: Arc::new(TaskInner {
                process,
                config,
                policy,
                failure_mode,
                started: AtomicBool::new(false),
                success: AtomicU64::new(0),
                total: AtomicU64::new(0),
                engine: Mutex::new(Engine::new()),
                bus,
            }),
        }
    }

    /// Starts the task unless `start_enabled` is false.
    ///
    /// Returns `false` when disabled or when [`force_start`](Self::force_start) fails.
    pub fn start(&self) -> bool {
        if !self.inner.config.start_enabled {
            tracing::debug!(task = self.name(), "start disabled by config");
            return false;
        }
        match self.force_start() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(task = self.name(), error = %err, "start failed");
                false
            }
        }
    }

    /// Starts (or revives) the task regardless of `start_enabled`.
    ///
    /// - a shut-down engine is replaced with a fresh one;
    /// - a new tick loop is scheduled if the task was never started or its engine
    ///   was shut down; otherwise scheduling is left untouched;
    /// - every new loop, revivals included, waits `initial_delay` before its
    ///   first tick;
    /// - `was_started()` becomes true.
    ///
    /// Requires an ambient Tokio runtime. Fails with [`StartError::Draining`]
    /// while a concurrent [`safe_stop`](Self::safe_stop) is still waiting for the
    /// previous loop, so ticks never overlap.
    pub fn force_start(&self) -> Result<(), StartError> {
        let rt = tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let mut engine = self.inner.lock_engine();
        if engine.is_draining() {
            return Err(StartError::Draining);
        }
        let was_shut_down = engine.is_shut_down();
        if was_shut_down {
            *engine = Engine::new();
        }
        if !self.was_started() || was_shut_down {
            engine.spawn(&rt, Arc::clone(&self.inner));
            tracing::debug!(
                task = self.name(),
                parallelism = self.inner.config.parallelism_clamped(),
                revived = was_shut_down,
                "tick loop scheduled"
            );
            self.inner
                .publish(Event::new(EventKind::TaskStarted).with_task(self.name()));
        }
        self.inner.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Stops the tick loop: graceful wait up to `shutdown_grace`, then abort.
    ///
    /// Idempotent; never fails. An in-flight tick is allowed to finish during the
    /// grace period, and the task cannot be restarted until the loop has exited.
    pub async fn safe_stop(&self) {
        let join = {
            let mut engine = self.inner.lock_engine();
            engine.shut_down();
            let join = engine.take_join();
            if join.is_some() {
                engine.set_draining(true);
            }
            join
        };
        let Some(join) = join else {
            return;
        };
        let mut drain = Drain {
            inner: &self.inner,
            join,
        };

        let grace = self.inner.config.shutdown_grace;
        match time::timeout(grace, &mut drain.join).await {
            Ok(Ok(LoopExit::Cancelled)) => {
                tracing::debug!(task = self.name(), "task stopped");
            }
            Ok(Ok(LoopExit::Failed(err))) => {
                tracing::debug!(task = self.name(), error = %err, "task stopped after failure");
            }
            Ok(Err(err)) => {
                tracing::warn!(task = self.name(), error = %err, "tick loop ended abnormally");
            }
            Err(_elapsed) => {
                drain.join.abort();
                let _ = (&mut drain.join).await;
                tracing::warn!(task = self.name(), ?grace, "tick loop aborted after grace");
                self.inner.publish(
                    Event::new(EventKind::StopForced)
                        .with_task(self.name())
                        .with_grace(grace),
                );
            }
        }
        drop(drain);

        self.inner
            .publish(Event::new(EventKind::TaskStopped).with_task(self.name()));
    }

    /// True once the task has been started at least once.
    pub fn was_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// True when the engine is shut down (explicit stop or failed tick).
    pub fn is_stopped(&self) -> bool {
        self.inner.lock_engine().is_shut_down()
    }

    /// True while `safe_stop` waits for the previous loop to exit; the task
    /// cannot be (re)started meanwhile.
    pub fn is_draining(&self) -> bool {
        self.inner.lock_engine().is_draining()
    }

    /// Number of ticks whose process returned `Ok`.
    pub fn successful_process_count(&self) -> u64 {
        self.inner.success.load(Ordering::Acquire)
    }

    /// Number of ticks executed, successful or not.
    pub fn total_process_count(&self) -> u64 {
        self.inner.total.load(Ordering::Acquire)
    }

    /// The restart policy, if any.
    pub fn restart_policy(&self) -> Option<&Arc<RestartPolicy>> {
        self.inner.policy.as_ref()
    }

    /// What a failing tick does to this task.
    pub fn failure_mode(&self) -> FailureMode {
        self.inner.failure_mode
    }

    /// Task name (from its process).
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Scheduling configuration.
    pub fn config(&self) -> &TaskConfig {
        &self.inner.config
    }
}

impl fmt::Debug for SupervisedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedTask")
            .field("name", &self.name())
            .field("started", &self.was_started())
            .field("stopped", &self.is_stopped())
            .field("success", &self.successful_process_count())
            .field("total", &self.total_process_count())
            .field("failure_mode", &self.failure_mode())
            .finish()
    }
}

/// Builder for [`SupervisedTask`].
pub struct SupervisedTaskBuilder {
    process: ProcessRef,
    config: TaskConfig,
    policy: Option<Arc<RestartPolicy>>,
    bus: Option<Bus>,
}

impl SupervisedTaskBuilder {
    /// Creates a builder with default config, no policy and no bus.
    pub fn new(process: ProcessRef) -> Self {
        Self {
            process,
            config: TaskConfig::default(),
            policy: None,
            bus: None,
        }
    }

    /// Sets the scheduling configuration.
    pub fn with_config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a restart policy, making the task revivable by a watchdog.
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Attaches an already shared restart policy.
    pub fn with_shared_policy(mut self, policy: Arc<RestartPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Publishes lifecycle events into `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the task (idle, not started).
    pub fn build(self) -> SupervisedTask {
        SupervisedTask::from_parts(self.process, self.config, self.policy, self.bus)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use crate::error::TaskError;
    use crate::tasks::ProcessFn;

    /// Fast scheduling used by tests: 100ms initial delay and period.
    pub(crate) fn fast_config() -> TaskConfig {
        TaskConfig {
            start_enabled: true,
            parallelism: 1,
            initial_delay: Duration::from_millis(100),
            period: Duration::from_millis(100),
            shutdown_grace: Duration::from_millis(100),
        }
    }

    /// Process that fails on its first `failures` calls, then succeeds.
    pub(crate) fn flaky(failures: u32) -> ProcessRef {
        let calls = Arc::new(AtomicU32::new(0));
        ProcessFn::arc("flaky", move || {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move {
                if n < failures {
                    Err(TaskError::fail(format!("boom #{}", n + 1)))
                } else {
                    Ok(())
                }
            }
        })
    }

    fn always_ok() -> ProcessRef {
        flaky(0)
    }

    fn always_fail() -> ProcessRef {
        flaky(u32::MAX)
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_ticks() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert!(task.start());
        assert!(task.was_started());

        time::sleep(Duration::from_millis(550)).await;
        assert!(task.successful_process_count() > 1);
        assert!(task.total_process_count() > 1);
        assert!(!task.is_stopped());
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_task_ignores_start_but_not_force_start() {
        let task = SupervisedTask::new(
            always_ok(),
            fast_config().with_start_enabled(false),
            None,
        );
        assert!(!task.start());
        assert!(!task.was_started());

        task.force_start().unwrap();
        assert!(task.was_started());
        time::sleep(Duration::from_millis(250)).await;
        assert!(task.successful_process_count() >= 1);
        task.safe_stop().await;
    }

    #[test]
    fn force_start_outside_runtime_fails_and_start_returns_false() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert_eq!(task.force_start(), Err(StartError::NoRuntime));
        assert!(!task.start());
        assert!(!task.was_started());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_policy_is_permanent() {
        let task = SupervisedTask::new(always_fail(), fast_config(), None);
        assert_eq!(task.failure_mode(), FailureMode::Kill);
        assert!(task.start());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(task.total_process_count(), 1);
        assert_eq!(task.successful_process_count(), 0);
        assert!(task.is_stopped());

        time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(task.total_process_count(), 1);
        assert!(task.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_with_policy_stops_and_waits() {
        let task = SupervisedTask::builder(always_fail())
            .with_config(fast_config())
            .with_restart_policy(RestartPolicy::constant(5, Duration::from_millis(100)).unwrap())
            .build();
        assert_eq!(task.failure_mode(), FailureMode::AwaitRevival);
        assert!(task.start());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(task.total_process_count(), 1);
        assert!(task.is_stopped());
        // Nobody consulted the policy yet.
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panics_are_contained_in_the_tick() {
        let task = SupervisedTask::new(
            ProcessFn::arc("panicky", || async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, TaskError>(())
            }),
            fast_config(),
            None,
        );
        assert!(task.start());

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(task.total_process_count(), 1);
        assert_eq!(task.successful_process_count(), 0);
        assert!(task.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn safe_stop_twice_is_harmless() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert!(task.start());
        time::sleep(Duration::from_millis(250)).await;

        task.safe_stop().await;
        task.safe_stop().await;
        assert!(task.is_stopped());
        assert!(task.was_started());

        let ticks = task.total_process_count();
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(task.total_process_count(), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn safe_stop_before_start_is_harmless() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert!(!task.is_stopped());
        task.safe_stop().await;
        assert!(task.is_stopped());
        assert!(!task.was_started());
    }

    #[tokio::test(start_paused = true)]
    async fn force_start_revives_a_stopped_task() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert!(task.start());
        time::sleep(Duration::from_millis(250)).await;
        task.safe_stop().await;
        let ticks = task.total_process_count();

        task.force_start().unwrap();
        assert!(!task.is_stopped());
        time::sleep(Duration::from_millis(250)).await;
        assert!(task.total_process_count() > ticks);
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn revived_loop_waits_initial_delay_again() {
        let task = SupervisedTask::new(always_ok(), fast_config(), None);
        assert!(task.start());
        time::sleep(Duration::from_millis(150)).await;
        task.safe_stop().await;
        assert_eq!(task.total_process_count(), 1);

        task.force_start().unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(task.total_process_count(), 1);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(task.total_process_count(), 2);
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn force_start_while_running_does_not_double_schedule() {
        let task = SupervisedTask::new(
            always_ok(),
            TaskConfig {
                initial_delay: Duration::ZERO,
                period: Duration::from_millis(100),
                ..fast_config()
            },
            None,
        );
        assert!(task.start());
        task.force_start().unwrap();
        task.force_start().unwrap();

        // Ticks at 0, 100, ..., 1000ms with a single loop.
        time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(task.total_process_count(), 11);
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tick_is_aborted_after_grace() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = SupervisedTask::builder(ProcessFn::arc("stuck", || async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, TaskError>(())
        }))
        .with_config(TaskConfig {
            initial_delay: Duration::ZERO,
            shutdown_grace: Duration::from_millis(200),
            ..fast_config()
        })
        .with_bus(bus)
        .build();

        assert!(task.start());
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(task.total_process_count(), 1);

        let started = time::Instant::now();
        task.safe_stop().await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(200));
        assert!(waited < Duration::from_secs(1));
        assert!(task.is_stopped());
        assert_eq!(task.successful_process_count(), 0);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TaskStarted,
                EventKind::StopForced,
                EventKind::TaskStopped
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restart_is_refused_until_the_stopped_loop_exits() {
        let task = SupervisedTask::new(
            ProcessFn::arc("slow", || async {
                time::sleep(Duration::from_millis(400)).await;
                Ok::<_, TaskError>(())
            }),
            TaskConfig {
                initial_delay: Duration::ZERO,
                shutdown_grace: Duration::from_secs(2),
                ..fast_config()
            },
            None,
        );
        assert!(task.start());
        time::sleep(Duration::from_millis(100)).await;

        let stopper = task.clone();
        let stopping = tokio::spawn(async move { stopper.safe_stop().await });
        time::sleep(Duration::from_millis(10)).await;

        assert!(task.is_stopped());
        assert!(task.is_draining());
        assert_eq!(task.force_start(), Err(StartError::Draining));
        assert!(!task.start());

        stopping.await.unwrap();
        assert!(!task.is_draining());
        assert_eq!(task.total_process_count(), 1);
        assert_eq!(task.successful_process_count(), 1);

        task.force_start().unwrap();
        assert!(!task.is_stopped());
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_publishes_lifecycle_events() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = SupervisedTask::builder(always_fail())
            .with_config(fast_config())
            .with_bus(bus)
            .build();

        assert!(task.start());
        time::sleep(Duration::from_millis(300)).await;

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let kinds: Vec<EventKind> = events.iter().map(|ev| ev.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TaskStarted,
                EventKind::TickFailed,
                EventKind::TaskDied
            ]
        );
        assert_eq!(events[1].attempt, Some(1));
        assert_eq!(events[1].reason.as_deref(), Some("tick failed: boom #1"));
    }
}
