//! # Function-backed process (`ProcessFn`)
//!
//! [`ProcessFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future per tick.
//! State that must survive between ticks lives behind an `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use tickvisor::{Process, ProcessFn, ProcessRef, TaskError};
//!
//! let seen = Arc::new(AtomicU64::new(0));
//! let counter = seen.clone();
//! let p: ProcessRef = ProcessFn::arc("counter", move || {
//!     let counter = counter.clone();
//!     async move {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         Ok::<_, TaskError>(())
//!     }
//! });
//!
//! assert_eq!(p.name(), "counter");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::process::Process;

/// Function-backed process implementation.
pub struct ProcessFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ProcessFn<F> {
    /// Creates a new function-backed process.
    ///
    /// Prefer [`ProcessFn::arc`] when you immediately need a [`ProcessRef`](crate::ProcessRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the process and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> fmt::Debug for ProcessFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Process for ProcessFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self) -> Result<(), TaskError> {
        (self.f)().await
    }
}
