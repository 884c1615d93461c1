//! # Watchdog: revives dead tasks through their restart policies.
//!
//! A [`Watchdog`] is itself a [`SupervisedTask`] (no policy of its own) whose unit
//! of work is one reconciliation pass over a fixed set of watched tasks.
//!
//! ```text
//! every period:
//!   for (id, task) in watched:
//!     ├─ task running or draining  ─► skip
//!     ├─ next[id] = None           ─► skip (abandoned)
//!     ├─ next[id] = Some(t), t ≥ now ─► skip (backoff window still open)
//!     └─ next[id] = Some(t), t < now:
//!          next[id] = policy.next_start_time(now)
//!          ├─ Some(_) ─► task.force_start(), RestartScheduled
//!          └─ None    ─► RestartExhausted (never revived again)
//! ```
//!
//! ## Rules
//! - Only tasks carrying a restart policy are watched; membership is fixed at
//!   construction.
//! - The next-restart table starts at `clock.now()` for every watched task, so
//!   the first failure is revived on the next pass.
//! - A revival is immediate; the policy delay gates the *following* revival.
//! - A task whose `safe_stop` is still waiting for its loop is skipped without
//!   consuming an attempt; it becomes eligible once that loop has exited.
//! - A failed `force_start` is logged; the watchdog keeps running.
//! - Tasks that were never started are not stopped, hence never started by the
//!   watchdog.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::clock::{Clock, TokioClock};
use crate::core::config::WatchdogConfig;
use crate::core::task::SupervisedTask;
use crate::error::{StartError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::Process;

const WATCHDOG_NAME: &str = "watchdog";

/// Stable handle of a watched task, in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(usize);

impl WatchId {
    /// Position of the task in [`Watchdog::watched`].
    pub fn index(self) -> usize {
        self.0
    }
}

/// One reconciliation pass per tick.
struct Reconciler {
    slots: Vec<SupervisedTask>,
    next: Mutex<Vec<Option<Instant>>>,
    clock: Arc<dyn Clock>,
    bus: Option<Bus>,
}

impl Reconciler {
    fn new(slots: Vec<SupervisedTask>, clock: Arc<dyn Clock>, bus: Option<Bus>) -> Self {
        let now = clock.now();
        let next = Mutex::new(vec![Some(now); slots.len()]);
        Self {
            slots,
            next,
            clock,
            bus,
        }
    }

    fn lock_next(&self) -> MutexGuard<'_, Vec<Option<Instant>>> {
        self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    fn reconcile(&self) {
        let now = self.clock.now();
        let mut next = self.lock_next();

        for (slot, task) in next.iter_mut().zip(&self.slots) {
            if !task.is_stopped() || task.is_draining() {
                continue;
            }
            let Some(policy) = task.restart_policy() else {
                continue;
            };
            if !matches!(*slot, Some(due) if due < now) {
                continue;
            }

            *slot = policy.next_start_time(now);
            let attempt = u64::from(policy.current_attempt());
            match *slot {
                Some(at) => {
                    let gate = at.saturating_duration_since(now);
                    match task.force_start() {
                        Ok(()) => {
                            tracing::info!(task = task.name(), attempt, ?gate, "task revived");
                            self.publish(
                                Event::new(EventKind::RestartScheduled)
                                    .with_task(task.name())
                                    .with_attempt(attempt)
                                    .with_delay(gate),
                            );
                        }
                        Err(err) => {
                            tracing::warn!(task = task.name(), attempt, error = %err, "revival failed");
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        task = task.name(),
                        max_attempts = policy.max_attempts(),
                        "restart budget exhausted, task abandoned"
                    );
                    self.publish(
                        Event::new(EventKind::RestartExhausted)
                            .with_task(task.name())
                            .with_attempt(attempt),
                    );
                }
            }
        }
    }
}

#[async_trait]
impl Process for Reconciler {
    fn name(&self) -> &str {
        WATCHDOG_NAME
    }

    async fn process(&self) -> Result<(), TaskError> {
        self.reconcile();
        Ok(())
    }
}

/// Periodically revives stopped tasks whose restart window has elapsed.
pub struct Watchdog {
    reconciler: Arc<Reconciler>,
    task: SupervisedTask,
    config: WatchdogConfig,
}

impl Watchdog {
    /// Creates a watchdog over `tasks`; tasks without a restart policy are ignored.
    ///
    /// Uses [`TokioClock`] and publishes no events; see [`Watchdog::builder`].
    pub fn new(tasks: impl IntoIterator<Item = SupervisedTask>, config: WatchdogConfig) -> Self {
        Self::builder(tasks, config).build()
    }

    /// Starts a builder over `tasks` with the given configuration.
    pub fn builder(
        tasks: impl IntoIterator<Item = SupervisedTask>,
        config: WatchdogConfig,
    ) -> WatchdogBuilder {
        WatchdogBuilder::new(tasks, config)
    }

    /// Starts reconciling. Always enabled.
    pub fn start(&self) -> bool {
        self.task.start()
    }

    /// See [`SupervisedTask::force_start`].
    pub fn force_start(&self) -> Result<(), StartError> {
        self.task.force_start()
    }

    /// Stops reconciling; watched tasks are left as they are.
    pub async fn safe_stop(&self) {
        self.task.safe_stop().await;
    }

    /// True when the watchdog loop is shut down.
    pub fn is_stopped(&self) -> bool {
        self.task.is_stopped()
    }

    /// True once the watchdog has been started.
    pub fn was_started(&self) -> bool {
        self.task.was_started()
    }

    /// Watched tasks, indexed by [`WatchId`].
    pub fn watched(&self) -> &[SupervisedTask] {
        &self.reconciler.slots
    }

    /// Ids of the watched tasks in registration order.
    pub fn ids(&self) -> impl Iterator<Item = WatchId> + '_ {
        (0..self.reconciler.slots.len()).map(WatchId)
    }

    /// Earliest instant the task may be revived again; `None` once abandoned
    /// (or for an unknown id).
    pub fn next_start_time(&self, id: WatchId) -> Option<Instant> {
        self.reconciler.lock_next().get(id.0).copied().flatten()
    }

    /// The supervised task running the reconciliation passes.
    pub fn task(&self) -> &SupervisedTask {
        &self.task
    }

    /// Watchdog configuration.
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }
}

/// Builder for [`Watchdog`]; the time source and bus are fixed once built.
pub struct WatchdogBuilder {
    slots: Vec<SupervisedTask>,
    config: WatchdogConfig,
    clock: Arc<dyn Clock>,
    bus: Option<Bus>,
}

impl WatchdogBuilder {
    /// Keeps only the tasks that carry a restart policy.
    pub fn new(tasks: impl IntoIterator<Item = SupervisedTask>, config: WatchdogConfig) -> Self {
        Self {
            slots: tasks
                .into_iter()
                .filter(|t| t.restart_policy().is_some())
                .collect(),
            config,
            clock: Arc::new(TokioClock),
            bus: None,
        }
    }

    /// Replaces the time source used to gate revivals.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publishes watchdog decisions and its own lifecycle into `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the watchdog (idle, not started). The restart table starts at
    /// `clock.now()`.
    pub fn build(self) -> Watchdog {
        let reconciler = Arc::new(Reconciler::new(self.slots, self.clock, self.bus.clone()));
        let mut task = SupervisedTask::builder(reconciler.clone())
            .with_config(self.config.as_task_config());
        if let Some(bus) = self.bus {
            task = task.with_bus(bus);
        }
        Watchdog {
            reconciler,
            task: task.build(),
            config: self.config,
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("watched", &self.reconciler.slots.len())
            .field("started", &self.was_started())
            .field("stopped", &self.is_stopped())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::core::task::tests::{fast_config, flaky};
    use crate::policies::RestartPolicy;

    fn watched(failures: u32, policy: RestartPolicy) -> SupervisedTask {
        SupervisedTask::builder(flaky(failures))
            .with_config(fast_config())
            .with_restart_policy(policy)
            .build()
    }

    fn fast_config_wd() -> WatchdogConfig {
        WatchdogConfig::every(Duration::from_millis(50))
    }

    fn fast_watchdog(tasks: Vec<SupervisedTask>) -> Watchdog {
        Watchdog::new(tasks, fast_config_wd())
    }

    #[test]
    fn tasks_without_policy_are_not_watched() {
        let plain = SupervisedTask::new(flaky(0), fast_config(), None);
        let guarded = watched(0, RestartPolicy::default());
        let wd = fast_watchdog(vec![plain, guarded]);

        assert_eq!(wd.watched().len(), 1);
        assert!(wd.watched()[0].restart_policy().is_some());
        assert_eq!(wd.ids().collect::<Vec<_>>(), vec![WatchId(0)]);
        assert!(wd.next_start_time(WatchId(0)).is_some());
        assert!(wd.next_start_time(WatchId(7)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn revives_a_failed_task_once() {
        let task = watched(1, RestartPolicy::constant(3, Duration::from_millis(200)).unwrap());
        let wd = fast_watchdog(vec![task.clone()]);

        assert!(task.start());
        assert!(wd.start());
        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert!(!task.is_stopped());
        assert!(task.successful_process_count() >= 1);
        assert_eq!(
            task.total_process_count(),
            task.successful_process_count() + 1
        );
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 1);

        wd.safe_stop().await;
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn abandons_a_task_after_max_attempts() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let task = watched(
            u32::MAX,
            RestartPolicy::constant(2, Duration::from_millis(100)).unwrap(),
        );
        let wd = Watchdog::builder(vec![task.clone()], fast_config_wd())
            .with_bus(bus)
            .build();

        assert!(task.start());
        assert!(wd.start());
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Initial run plus two revivals.
        assert_eq!(task.total_process_count(), 3);
        assert_eq!(task.successful_process_count(), 0);
        assert!(task.is_stopped());
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 2);
        assert_eq!(wd.next_start_time(WatchId(0)), None);
        assert!(!wd.is_stopped());

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        let count = |k: EventKind| kinds.iter().filter(|&&x| x == k).count();
        assert_eq!(count(EventKind::RestartScheduled), 2);
        assert_eq!(count(EventKind::RestartExhausted), 1);

        wd.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn never_started_tasks_are_left_alone() {
        let task = watched(0, RestartPolicy::default());
        let wd = fast_watchdog(vec![task.clone()]);

        assert!(wd.start());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!task.was_started());
        assert_eq!(task.total_process_count(), 0);
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 0);
        wd.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_window_gates_the_next_revival() {
        let clock = Arc::new(ManualClock::new());
        let task = watched(
            u32::MAX,
            RestartPolicy::constant(5, Duration::from_secs(60)).unwrap(),
        );
        let wd = Watchdog::builder(vec![task.clone()], fast_config_wd())
            .with_clock(clock.clone())
            .build();

        assert!(task.start());
        clock.advance(Duration::from_millis(1));
        assert!(wd.start());

        // First failure at 100ms, revived on the next pass; second failure
        // ~100ms later stays dead because the manual clock never moved past
        // the 60s gate.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(task.total_process_count(), 2);
        assert!(task.is_stopped());
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 1);

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 2);
        assert!(task.total_process_count() >= 2);

        wd.safe_stop().await;
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_of_a_slow_tick_never_overlaps_with_a_revival() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let (a, p) = (active.clone(), peak.clone());
        let slow = crate::tasks::ProcessFn::arc("slow", move || {
            let (active, peak) = (a.clone(), p.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(400)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            }
        });
        let task = SupervisedTask::builder(slow)
            .with_config(crate::core::config::TaskConfig {
                shutdown_grace: Duration::from_secs(2),
                ..fast_config()
            })
            .with_restart_policy(RestartPolicy::constant(5, Duration::from_millis(50)).unwrap())
            .build();
        let wd = Watchdog::new(
            vec![task.clone()],
            WatchdogConfig::every(Duration::from_millis(20)),
        );

        assert!(task.start());
        assert!(wd.start());
        // First tick runs from 100ms to 500ms.
        tokio::time::sleep(Duration::from_millis(200)).await;

        task.safe_stop().await;
        assert!(task.is_stopped());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 0);

        // Once the old loop is gone the watchdog may revive the task, but ticks
        // still never overlap.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);

        wd.safe_stop().await;
        task.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn builder_applies_clock_and_bus_before_start() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let clock = Arc::new(ManualClock::new());
        let wd = Watchdog::builder(
            vec![watched(0, RestartPolicy::default())],
            fast_config_wd(),
        )
        .with_clock(clock.clone())
        .with_bus(bus)
        .build();

        assert_eq!(wd.next_start_time(WatchId(0)), Some(clock.now()));
        assert!(wd.start());
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::TaskStarted);
        assert_eq!(ev.task.as_deref(), Some("watchdog"));
        wd.safe_stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_watchdog_does_not_revive() {
        let task = watched(u32::MAX, RestartPolicy::default());
        let wd = fast_watchdog(vec![task.clone()]);

        assert!(wd.start());
        wd.safe_stop().await;
        assert!(wd.is_stopped());

        assert!(task.start());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(task.total_process_count(), 1);
        assert!(task.is_stopped());
        assert_eq!(task.restart_policy().unwrap().current_attempt(), 0);
    }
}
