//! # Unit of work executed on every tick.
//!
//! A [`Process`] is what a [`SupervisedTask`](crate::SupervisedTask) runs once per
//! period. The common handle type is [`ProcessRef`], an `Arc<dyn Process>` shared
//! between the task handle and its tick loop.
//!
//! Returning `Err` (or panicking) ends the current run of the tick loop; what
//! happens next is decided by the task's restart policy, not by the process.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;

/// Shared handle to a unit of work.
pub type ProcessRef = Arc<dyn Process>;

/// # One tick of periodic work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tickvisor::{Process, TaskError};
///
/// struct Flush;
///
/// #[async_trait]
/// impl Process for Flush {
///     fn name(&self) -> &str { "flush" }
///
///     async fn process(&self) -> Result<(), TaskError> {
///         // write buffered records...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Process: Send + Sync + 'static {
    /// Returns a stable, human-readable name used in logs and events.
    fn name(&self) -> &str;

    /// Runs one tick of work.
    ///
    /// Runs to completion: stopping the task waits for an in-flight tick during the
    /// grace period and only aborts it afterwards.
    async fn process(&self) -> Result<(), TaskError>;
}
