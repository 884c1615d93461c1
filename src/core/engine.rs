//! # Execution engine: the fixed-delay tick loop of one task.
//!
//! An [`Engine`] is the live scheduling resource of a
//! [`SupervisedTask`](crate::SupervisedTask): a cancellation token plus the join
//! handle of the Tokio task running [`tick_loop`]. Once its token is cancelled the
//! engine is *shut down* for good; restarting a task always builds a fresh engine.
//!
//! ## Loop
//! ```text
//! tick_loop(task, token)
//!   ├─► sleep(initial_delay)      (cancellable)
//!   └─► loop {
//!         ├─► run_tick()  ─► total += 1
//!         │                 ├─ process() Ok          ─► success += 1
//!         │                 └─ process() Err / panic ─► TickFailed
//!         │                      ├─ FailureMode::Kill         ─► TaskDied
//!         │                      ├─ FailureMode::AwaitRevival ─► TaskSuspended
//!         │                      └─► token.cancel(), exit Failed(err)
//!         └─► sleep(period)       (cancellable) ─► exit Cancelled
//!       }
//! ```
//!
//! ## Rules
//! - Ticks never overlap: the next sleep starts after the previous tick completes.
//! - Cancellation is observed **only while sleeping**; a running tick is never
//!   interrupted by the token (only `safe_stop`'s forced abort can do that).
//! - Errors and panics never escape the loop; they become a typed [`LoopExit`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::FutureExt;
use tokio::{select, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::core::task::{FailureMode, TaskInner};
use crate::error::{TaskError, panic_message};
use crate::events::{Event, EventKind};

/// How a tick loop ended.
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// The engine was shut down from outside (`safe_stop`).
    Cancelled,
    /// A tick failed; the loop shut its own engine down.
    Failed(TaskError),
}

/// Live scheduling resource of a task.
///
/// While `draining`, a `safe_stop` has detached the loop handle and is still
/// waiting for the loop to exit; the engine must not be replaced until then.
pub(crate) struct Engine {
    token: CancellationToken,
    join: Option<JoinHandle<LoopExit>>,
    draining: bool,
}

impl Engine {
    /// Creates an idle engine: not shut down, no loop attached.
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            join: None,
            draining: false,
        }
    }

    /// True once shutdown was requested (by `safe_stop` or a failing tick).
    pub(crate) fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True while a detached loop may still be running its last tick.
    pub(crate) fn is_draining(&self) -> bool {
        self.draining
    }

    /// Marks the detached loop as running (`true`) or exited (`false`).
    pub(crate) fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// Requests shutdown. Idempotent.
    pub(crate) fn shut_down(&self) {
        self.token.cancel();
    }

    /// Spawns the tick loop for `task` on `rt` and attaches its handle.
    pub(crate) fn spawn(&mut self, rt: &tokio::runtime::Handle, task: Arc<TaskInner>) {
        let token = self.token.clone();
        self.join = Some(rt.spawn(tick_loop(task, token)));
    }

    /// Detaches the loop handle, if any.
    pub(crate) fn take_join(&mut self) -> Option<JoinHandle<LoopExit>> {
        self.join.take()
    }
}

/// Runs ticks on a fixed delay until cancelled or a tick fails.
pub(crate) async fn tick_loop(task: Arc<TaskInner>, token: CancellationToken) -> LoopExit {
    if !sleep_or_cancel(task.config.initial_delay, &token).await {
        return LoopExit::Cancelled;
    }

    loop {
        if let Err(err) = run_tick(&task).await {
            report_failure(&task, &err);
            token.cancel();
            return LoopExit::Failed(err);
        }
        if !sleep_or_cancel(task.config.period, &token).await {
            return LoopExit::Cancelled;
        }
    }
}

/// Executes one tick: bumps counters, runs the process with panics caught.
pub(crate) async fn run_tick(task: &TaskInner) -> Result<(), TaskError> {
    let tick = task.total.fetch_add(1, Ordering::AcqRel) + 1;

    let res = match AssertUnwindSafe(task.process.process())
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => Err(TaskError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    };

    match &res {
        Ok(()) => {
            task.success.fetch_add(1, Ordering::AcqRel);
        }
        Err(err) => {
            tracing::warn!(task = task.name(), tick, error = %err, "tick failed");
            task.publish(
                Event::new(EventKind::TickFailed)
                    .with_task(task.name())
                    .with_attempt(tick)
                    .with_reason(err.to_string()),
            );
        }
    }
    res
}

/// Publishes the outcome of a failed tick according to the task's failure mode.
fn report_failure(task: &TaskInner, err: &TaskError) {
    let kind = match task.failure_mode {
        FailureMode::Kill => {
            tracing::error!(task = task.name(), error = %err, "task died, no restart policy");
            EventKind::TaskDied
        }
        FailureMode::AwaitRevival => {
            tracing::info!(task = task.name(), error = %err, "task suspended until revived");
            EventKind::TaskSuspended
        }
    };
    task.publish(
        Event::new(kind)
            .with_task(task.name())
            .with_reason(err.to_string()),
    );
}

/// Sleeps for `d`; returns `false` if `token` was cancelled first.
async fn sleep_or_cancel(d: Duration, token: &CancellationToken) -> bool {
    select! {
        biased;
        _ = token.cancelled() => false,
        _ = time::sleep(d) => true,
    }
}
