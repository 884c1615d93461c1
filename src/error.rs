//! Error types used by tickvisor.
//!
//! - [`PolicyError`] - invalid restart policy configuration (raised at construction).
//! - [`TaskError`] - failure of a single tick of a supervised task.
//! - [`StartError`] - a task could not acquire an execution engine.
//! - [`DispatchError`] - a dispatcher batch could not be assembled.
//!
//! Every type provides `as_label` (stable snake_case label for logs/metrics).
//! Only configuration errors cross component boundaries; tick failures are
//! contained inside the tick loop and surface as counters, flags and events.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// # Invalid restart policy configuration.
///
/// Returned synchronously by the [`RestartPolicy`](crate::RestartPolicy) constructors,
/// before any scheduling decision is made.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be positive, got {max_attempts}")]
    InvalidMaxAttempts {
        /// The rejected value.
        max_attempts: u32,
    },

    /// The base waiting duration must be strictly positive.
    #[error("base waiting duration must be positive")]
    NonPositiveBase,

    /// The delay function produced a zero delay for the sample point `(attempt = 1, base = 1s)`.
    #[error("delay function must produce a positive delay, got {sample:?} at attempt 1, base 1s")]
    NonPositiveDelay {
        /// The delay computed at the sample point.
        sample: Duration,
    },

    /// A timeline policy was given no entries.
    #[error("timeline must contain at least one entry")]
    EmptyTimeline,

    /// A timeline entry was zero seconds.
    #[error("timeline entry #{index} must be positive")]
    NonPositiveTimelineEntry {
        /// Position of the offending entry.
        index: usize,
    },
}

impl PolicyError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::PolicyError;
    ///
    /// let err = PolicyError::InvalidMaxAttempts { max_attempts: 0 };
    /// assert_eq!(err.as_label(), "policy_invalid_max_attempts");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PolicyError::InvalidMaxAttempts { .. } => "policy_invalid_max_attempts",
            PolicyError::NonPositiveBase => "policy_non_positive_base",
            PolicyError::NonPositiveDelay { .. } => "policy_non_positive_delay",
            PolicyError::EmptyTimeline => "policy_empty_timeline",
            PolicyError::NonPositiveTimelineEntry { .. } => "policy_non_positive_timeline_entry",
        }
    }
}

/// # Failure of a single tick.
///
/// Returned by [`Process::process`](crate::Process::process), or synthesized by the
/// tick loop when the unit of work panics. Never propagated past the tick boundary.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The unit of work reported a failure.
    #[error("tick failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The unit of work panicked; the panic was caught at the tick boundary.
    #[error("tick panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }
}

/// # A task could not (re)acquire its execution engine.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// `force_start` was called outside of a Tokio runtime.
    #[error("no tokio runtime available to schedule the tick loop")]
    NoRuntime,

    /// `safe_stop` is still waiting for the previous tick loop to exit.
    #[error("previous tick loop is still draining")]
    Draining,
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::NoRuntime => "start_no_runtime",
            StartError::Draining => "start_draining",
        }
    }
}

/// # A dispatcher batch was rejected.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// One of the tasks handed to the dispatcher had already been started.
    #[error("task {task:?} is already started")]
    AlreadyStarted {
        /// Name of the offending task.
        task: String,
    },

    /// Subscribers were attached but no Tokio runtime is available to run them.
    #[error("no tokio runtime available to run subscribers")]
    NoRuntime,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::AlreadyStarted { .. } => "dispatch_already_started",
            DispatchError::NoRuntime => "dispatch_no_runtime",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
