//! # Delay functions for restart policies.
//!
//! [`Delay`] is the closed family of `(attempt, base) → duration` functions a
//! [`RestartPolicy`](crate::RestartPolicy) can use. Each variant carries its own
//! parameters; evaluation is pure and deterministic.
//!
//! | Variant                  | `eval(k, base)`                      |
//! |--------------------------|--------------------------------------|
//! | [`Delay::Constant`]      | `base`                               |
//! | [`Delay::Multiply`]      | `base × k`                           |
//! | [`Delay::TimelineSeconds`] | `timeline[(k - 1) mod len]` seconds |
//! | [`Delay::Ln`]            | `ln(base_ms × k)` ms                 |
//! | [`Delay::Exp`]           | `e^(base_ms × k)` ms                 |
//! | [`Delay::Pow`]           | `base_ms ^ k` ms                     |
//! | [`Delay::Pow2`]          | `(base_ms × k)²` ms                  |
//!
//! `k` is 1-based. Floating-point results are truncated to whole milliseconds;
//! negative results become zero, and non-finite or oversized results saturate
//! to [`MAX_DELAY`]. `Exp` and `Pow` hit that ceiling after one or two attempts
//! for any realistic base.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::Delay;
//!
//! let base = Duration::from_secs(2);
//! assert_eq!(Delay::Constant.eval(7, base), Duration::from_secs(2));
//! assert_eq!(Delay::Multiply.eval(3, base), Duration::from_secs(6));
//! assert_eq!(Delay::timeline([5, 10]).eval(3, base), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Upper bound for any computed delay (about 136 years).
pub const MAX_DELAY: Duration = Duration::from_secs(u32::MAX as u64);

/// Backoff delay function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delay {
    /// Always the base duration.
    Constant,
    /// Base duration times the attempt number.
    Multiply,
    /// Walks a list of second values, wrapping around.
    TimelineSeconds(Arc<[u64]>),
    /// Natural logarithm of `base_ms × attempt`, in milliseconds.
    Ln,
    /// `e` raised to `base_ms × attempt`, in milliseconds.
    Exp,
    /// `base_ms` raised to the attempt number, in milliseconds.
    Pow,
    /// Square of `base_ms × attempt`, in milliseconds.
    Pow2,
}

impl Delay {
    /// Builds a [`Delay::TimelineSeconds`] from any list of second values.
    pub fn timeline(seconds: impl Into<Vec<u64>>) -> Self {
        Delay::TimelineSeconds(seconds.into().into())
    }

    /// Short stable name of the variant, for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Delay::Constant => "constant",
            Delay::Multiply => "multiply",
            Delay::TimelineSeconds(_) => "timeline_seconds",
            Delay::Ln => "ln",
            Delay::Exp => "exp",
            Delay::Pow => "pow",
            Delay::Pow2 => "pow2",
        }
    }

    /// Evaluates the delay for the 1-based `attempt` and `base` duration.
    pub fn eval(&self, attempt: u32, base: Duration) -> Duration {
        let k = attempt.max(1);
        let base_ms = base.as_nanos() as f64 / 1_000_000.0;

        match self {
            Delay::Constant => base.min(MAX_DELAY),
            Delay::Multiply => base.checked_mul(k).map_or(MAX_DELAY, |d| d.min(MAX_DELAY)),
            Delay::TimelineSeconds(timeline) => {
                if timeline.is_empty() {
                    return Duration::ZERO;
                }
                let idx = (k as usize - 1) % timeline.len();
                Duration::from_secs(timeline[idx]).min(MAX_DELAY)
            }
            Delay::Ln => from_millis_f64((base_ms * f64::from(k)).ln()),
            Delay::Exp => from_millis_f64((base_ms * f64::from(k)).exp()),
            Delay::Pow => from_millis_f64(base_ms.powi(k.min(i32::MAX as u32) as i32)),
            Delay::Pow2 => from_millis_f64((base_ms * f64::from(k)).powi(2)),
        }
    }
}

/// Truncates fractional milliseconds into a duration clamped to `[0, MAX_DELAY]`.
fn from_millis_f64(ms: f64) -> Duration {
    let max_ms = MAX_DELAY.as_millis() as f64;
    if ms.is_nan() || ms <= 0.0 {
        Duration::ZERO
    } else if !ms.is_finite() || ms >= max_ms {
        MAX_DELAY
    } else {
        Duration::from_millis(ms as u64)
    }
}
