//! # Units of work.
//!
//! - [`Process`] - trait for one tick of periodic async work
//! - [`ProcessFn`] - closure-backed implementation
//! - [`ProcessRef`] - shared reference to a process (`Arc<dyn Process>`)

mod process;
mod process_fn;

pub use process::{Process, ProcessRef};
pub use process_fn::ProcessFn;
