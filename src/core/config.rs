//! # Task and watchdog configuration.
//!
//! [`TaskConfig`] holds the scheduling knobs of one [`SupervisedTask`](crate::SupervisedTask);
//! [`WatchdogConfig`] the knobs of a [`Watchdog`](crate::Watchdog).
//!
//! ## Sentinel values
//! - `parallelism = 0` → treated as 1 (see [`TaskConfig::parallelism_clamped`])
//! - `shutdown_grace = 0s` → abort the tick loop immediately on `safe_stop`

use std::time::Duration;

/// Default worker count hint.
pub const DEFAULT_PARALLELISM: usize = 1;
/// Default delay before the first tick.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
/// Default delay between the end of a tick and the start of the next one.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);
/// Default time `safe_stop` waits for an in-flight tick.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(5000);
/// Default watchdog reconciliation period (also its initial delay).
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_millis(1000);

/// Scheduling configuration of a supervised task.
///
/// ## Field semantics
/// - `start_enabled`: `start()` is a no-op returning `false` when unset (`force_start()` still works)
/// - `parallelism`: worker count hint reported in logs (`0` = 1)
/// - `initial_delay`: wait before the first tick of every (re)start
/// - `period`: fixed delay between the end of one tick and the start of the next
/// - `shutdown_grace`: how long `safe_stop` waits before aborting the tick loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    /// Policy-level kill switch for `start()`.
    pub start_enabled: bool,
    /// Worker count hint (`0` is clamped to 1).
    pub parallelism: usize,
    /// Delay before the first tick.
    pub initial_delay: Duration,
    /// Fixed delay between ticks (measured from the end of the previous tick).
    pub period: Duration,
    /// Grace period for `safe_stop`.
    pub shutdown_grace: Duration,
}

impl TaskConfig {
    /// Returns `parallelism` clamped to a minimum of 1.
    #[inline]
    pub fn parallelism_clamped(&self) -> usize {
        self.parallelism.max(1)
    }

    /// Returns a copy with `start_enabled` replaced.
    pub fn with_start_enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = enabled;
        self
    }

    /// Returns a copy with `initial_delay` replaced.
    pub fn with_initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    /// Returns a copy with `period` replaced.
    pub fn with_period(mut self, d: Duration) -> Self {
        self.period = d;
        self
    }

    /// Returns a copy with `shutdown_grace` replaced.
    pub fn with_shutdown_grace(mut self, d: Duration) -> Self {
        self.shutdown_grace = d;
        self
    }
}

impl Default for TaskConfig {
    /// Default configuration:
    ///
    /// - `start_enabled = true`
    /// - `parallelism = 1`
    /// - `initial_delay = 1000ms`
    /// - `period = 100ms`
    /// - `shutdown_grace = 5000ms`
    fn default() -> Self {
        Self {
            start_enabled: true,
            parallelism: DEFAULT_PARALLELISM,
            initial_delay: DEFAULT_INITIAL_DELAY,
            period: DEFAULT_PERIOD,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Configuration of a watchdog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Delay between reconciliation passes.
    pub period: Duration,
    /// Delay before the first reconciliation pass.
    pub initial_delay: Duration,
    /// Grace period for stopping the watchdog itself.
    pub shutdown_grace: Duration,
}

impl WatchdogConfig {
    /// Watchdog that waits `period` before its first pass and between passes.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            initial_delay: period,
            ..Self::default()
        }
    }

    /// Task configuration the watchdog runs with: always start-enabled, single worker.
    pub fn as_task_config(&self) -> TaskConfig {
        TaskConfig {
            start_enabled: true,
            parallelism: 1,
            initial_delay: self.initial_delay,
            period: self.period,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

impl Default for WatchdogConfig {
    /// `period = initial_delay = 1000ms`, `shutdown_grace = 5000ms`.
    fn default() -> Self {
        Self {
            period: DEFAULT_WATCHDOG_PERIOD,
            initial_delay: DEFAULT_WATCHDOG_PERIOD,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults() {
        let cfg = TaskConfig::default();
        assert!(cfg.start_enabled);
        assert_eq!(cfg.parallelism, 1);
        assert_eq!(cfg.initial_delay, Duration::from_millis(1000));
        assert_eq!(cfg.period, Duration::from_millis(100));
        assert_eq!(cfg.shutdown_grace, Duration::from_millis(5000));
    }

    #[test]
    fn zero_parallelism_is_clamped() {
        let cfg = TaskConfig {
            parallelism: 0,
            ..TaskConfig::default()
        };
        assert_eq!(cfg.parallelism_clamped(), 1);
    }

    #[test]
    fn watchdog_task_config_is_always_enabled() {
        let cfg = WatchdogConfig::every(Duration::from_millis(50)).as_task_config();
        assert!(cfg.start_enabled);
        assert_eq!(cfg.parallelism, 1);
        assert_eq!(cfg.initial_delay, Duration::from_millis(50));
        assert_eq!(cfg.period, Duration::from_millis(50));
        assert_eq!(cfg.shutdown_grace, DEFAULT_SHUTDOWN_GRACE);
    }
}
