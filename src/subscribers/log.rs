//! # LogWriter - lifecycle events as `tracing` records
//!
//! A subscriber that renders every [`Event`] through `tracing`, at a level that
//! matches its severity: failures and forced stops at `warn`, permanent deaths
//! and exhausted budgets at `error`, routine transitions at `info`/`debug`.
//!
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskStarted => debug!(seq = e.seq, task, "task started"),
            EventKind::TaskStopped => debug!(seq = e.seq, task, "task stopped"),
            EventKind::TickFailed => {
                warn!(seq = e.seq, task, tick = e.attempt, reason, "tick failed")
            }
            EventKind::TaskSuspended => {
                info!(seq = e.seq, task, reason, "task suspended, awaiting watchdog")
            }
            EventKind::TaskDied => error!(seq = e.seq, task, reason, "task died"),
            EventKind::StopForced => {
                warn!(seq = e.seq, task, grace_ms = e.grace_ms, "stop forced after grace")
            }
            EventKind::RestartScheduled => info!(
                seq = e.seq,
                task,
                attempt = e.attempt,
                next_gate_ms = e.delay_ms,
                "task revived"
            ),
            EventKind::RestartExhausted => {
                error!(seq = e.seq, task, attempt = e.attempt, "restart budget exhausted")
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
