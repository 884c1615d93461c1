//! # Lifecycle events emitted by supervised tasks and the watchdog.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Task lifecycle**: engine started, tick failed, task died/suspended, stopped
//! - **Watchdog decisions**: restart scheduled, restart budget exhausted
//! - **Subscriber health**: overflow, panic
//!
//! [`Event`] carries the optional metadata (task name, reason, attempt, delay).
//! Every event gets a process-wide monotonic `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_task("ingest")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_secs(10));
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.task.as_deref(), Some("ingest"));
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// A fresh tick loop was scheduled on a (possibly new) engine.
    ///
    /// Sets: `task`.
    TaskStarted,

    /// A tick returned an error or panicked.
    ///
    /// Sets: `task`, `reason`, `attempt` (total tick count including this one).
    TickFailed,

    /// The task failed without a restart policy and is dead for good.
    ///
    /// Sets: `task`, `reason`.
    TaskDied,

    /// The task failed and is waiting for the watchdog to revive it.
    ///
    /// Sets: `task`, `reason`.
    TaskSuspended,

    /// `safe_stop` finished: the tick loop has exited.
    ///
    /// Sets: `task`.
    TaskStopped,

    /// `safe_stop` grace elapsed and the tick loop was aborted.
    ///
    /// Sets: `task`, `grace_ms`.
    StopForced,

    // === Watchdog ===
    /// The watchdog revived a task; the next revival is gated by `delay_ms`.
    ///
    /// Sets: `task`, `attempt` (policy attempt consumed), `delay_ms`.
    RestartScheduled,

    /// The task's restart policy is exhausted; it will not be revived again.
    ///
    /// Sets: `task`, `attempt`.
    RestartExhausted,

    // === Subscribers ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Attempt or tick number, depending on the kind.
    pub attempt: Option<u64>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Shutdown grace in milliseconds (compact).
    pub grace_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            grace_ms: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt/tick number.
    #[inline]
    pub fn with_attempt(mut self, n: u64) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(saturating_millis(d));
        self
    }

    /// Attaches a shutdown grace (stored as milliseconds).
    #[inline]
    pub fn with_grace(mut self, d: Duration) -> Self {
        self.grace_ms = Some(saturating_millis(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::TaskStarted);
        let b = Event::new(EventKind::TaskStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_fill_metadata() {
        let ev = Event::new(EventKind::StopForced)
            .with_task("flush")
            .with_grace(Duration::from_secs(5))
            .with_reason("grace exceeded");

        assert_eq!(ev.task.as_deref(), Some("flush"));
        assert_eq!(ev.grace_ms, Some(5_000));
        assert_eq!(ev.reason.as_deref(), Some("grace exceeded"));
        assert!(ev.attempt.is_none());
    }

    #[test]
    fn huge_delay_saturates() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::MAX);
        assert_eq!(ev.delay_ms, Some(u64::MAX));
    }
}
