//! Restart policies.
//!
//! This module groups the knobs that control **whether** a crashed task may be
//! revived and **how long** the watchdog waits before the next revival.
//!
//! ## Contents
//! - [`RestartPolicy`] attempt budget + base duration + delay function (stateful)
//! - [`Delay`] closed family of `(attempt, base) → duration` functions
//!
//! ## Quick wiring
//! ```text
//! SupervisedTask { restart_policy: Option<Arc<RestartPolicy>> }
//!      └─► core::watchdog::Reconciler uses:
//!           - policy.next_start_time(now) to gate the next revival
//!           - None → task abandoned for good
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::default()` → `Delay::Constant`, 5 attempts, 5s base.

mod delay;
mod restart;

pub use delay::{Delay, MAX_DELAY};
pub use restart::{DEFAULT_BASE_DURATION, DEFAULT_MAX_ATTEMPTS, RestartPolicy};
