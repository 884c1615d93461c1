//! # Restart policy for crashed tasks.
//!
//! [`RestartPolicy`] decides **when** a dead [`SupervisedTask`](crate::SupervisedTask)
//! may be revived and **how many times**. It pairs a [`Delay`] function with a base
//! duration and a bounded attempt budget.
//!
//! ## Consuming attempts
//! ```text
//! next_start_time(now)
//!   ├─ attempt < max_attempts ─► attempt += 1 ─► Some(now + delay(attempt, base))
//!   └─ otherwise              ─► None (forever)
//! ```
//!
//! Every successful query consumes one attempt, **even if the caller then decides
//! not to restart**. The counter is never reset. Poll it only when a restart is
//! actually about to happen.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Clock, ManualClock, RestartPolicy};
//!
//! let policy = RestartPolicy::timeline_seconds(&[5, 10, 15], 2).unwrap();
//! assert_eq!(policy.max_attempts(), 6);
//!
//! let now = ManualClock::new().now();
//! let delays: Vec<_> = (0..6)
//!     .map(|_| policy.next_start_time(now).unwrap() - now)
//!     .map(|d| d.as_secs())
//!     .collect();
//! assert_eq!(delays, vec![5, 10, 15, 5, 10, 15]);
//! assert!(policy.next_start_time(now).is_none());
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::clock::{Clock, TokioClock};
use crate::error::PolicyError;
use crate::policies::delay::Delay;

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base waiting duration.
pub const DEFAULT_BASE_DURATION: Duration = Duration::from_secs(5);

/// Smallest gap between `from` and a returned restart instant.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Horizon used when `from + delay` does not fit into an [`Instant`].
const FALLBACK_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Stateful restart policy: a delay function plus an attempt budget.
///
/// Shared between the owning task and the watchdog behind an `Arc`; the attempt
/// counter is atomic.
pub struct RestartPolicy {
    delay: Delay,
    max_attempts: u32,
    base: Duration,
    attempt: AtomicU32,
    clock: Arc<dyn Clock>,
}

impl RestartPolicy {
    /// Creates a policy after validating its configuration.
    ///
    /// ### Validation
    /// - `max_attempts >= 1`
    /// - `base > 0`
    /// - `delay.eval(1, 1s) > 0`
    pub fn new(delay: Delay, max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        if max_attempts < 1 {
            return Err(PolicyError::InvalidMaxAttempts { max_attempts });
        }
        if base.is_zero() {
            return Err(PolicyError::NonPositiveBase);
        }
        let sample = delay.eval(1, Duration::from_secs(1));
        if sample.is_zero() {
            return Err(PolicyError::NonPositiveDelay { sample });
        }

        Ok(Self {
            delay,
            max_attempts,
            base,
            attempt: AtomicU32::new(0),
            clock: Arc::new(TokioClock),
        })
    }

    /// Always waits `base`.
    pub fn constant(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Constant, max_attempts, base)
    }

    /// Waits `base × attempt`.
    pub fn multiply(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Multiply, max_attempts, base)
    }

    /// Waits `ln(base_ms × attempt)` milliseconds.
    pub fn ln(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Ln, max_attempts, base)
    }

    /// Waits `e^(base_ms × attempt)` milliseconds. Saturates almost immediately.
    pub fn exp(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Exp, max_attempts, base)
    }

    /// Waits `base_ms ^ attempt` milliseconds. Saturates quickly.
    pub fn pow(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Pow, max_attempts, base)
    }

    /// Waits `(base_ms × attempt)²` milliseconds.
    pub fn pow2(max_attempts: u32, base: Duration) -> Result<Self, PolicyError> {
        Self::new(Delay::Pow2, max_attempts, base)
    }

    /// Walks `timeline` (in seconds) `repeat` times.
    ///
    /// `max_attempts = timeline.len() × repeat`, `base = timeline[0]` seconds.
    pub fn timeline_seconds(timeline: &[u64], repeat: u32) -> Result<Self, PolicyError> {
        let first = *timeline.first().ok_or(PolicyError::EmptyTimeline)?;
        if let Some(index) = timeline.iter().position(|s| *s == 0) {
            return Err(PolicyError::NonPositiveTimelineEntry { index });
        }
        let max_attempts = u32::try_from(timeline.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(repeat);

        Self::new(
            Delay::timeline(timeline),
            max_attempts,
            Duration::from_secs(first),
        )
    }

    /// Replaces the time source used by [`next_start_time_now`](Self::next_start_time_now).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Base waiting duration.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay function.
    pub fn delay(&self) -> &Delay {
        &self.delay
    }

    /// Number of attempts consumed so far.
    pub fn current_attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Number of attempts still available.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.current_attempt())
    }

    /// Returns the earliest instant a restart may happen, or `None` once the
    /// budget is exhausted.
    ///
    /// **Destructive**: each `Some` result consumes one attempt whether or not the
    /// caller acts on it.
    ///
    /// The returned instant is always strictly later than `from`: delays that
    /// truncate to zero (small-base `Ln`, `Pow`, `Pow2`) are raised to 1ms.
    pub fn next_start_time(&self, from: Instant) -> Option<Instant> {
        let max = self.max_attempts;
        let prev = self
            .attempt
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| {
                (a < max).then_some(a + 1)
            })
            .ok()?;

        let delay = self.delay.eval(prev + 1, self.base).max(MIN_DELAY);
        Some(
            from.checked_add(delay)
                .unwrap_or_else(|| from + FALLBACK_HORIZON),
        )
    }

    /// [`next_start_time`](Self::next_start_time) measured from the policy's clock.
    pub fn next_start_time_now(&self) -> Option<Instant> {
        self.next_start_time(self.clock.now())
    }
}

impl Default for RestartPolicy {
    /// Returns a [`Delay::Constant`] policy with [`DEFAULT_MAX_ATTEMPTS`] and
    /// [`DEFAULT_BASE_DURATION`].
    fn default() -> Self {
        Self {
            delay: Delay::Constant,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_BASE_DURATION,
            attempt: AtomicU32::new(0),
            clock: Arc::new(TokioClock),
        }
    }
}

impl fmt::Debug for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartPolicy")
            .field("delay", &self.delay)
            .field("max_attempts", &self.max_attempts)
            .field("base", &self.base)
            .field("attempt", &self.current_attempt())
            .finish()
    }
}
