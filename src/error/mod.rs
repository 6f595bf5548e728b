//! Error module orchestrator.
//!
//! Callers import [`LifecycleError`] and [`Result`] from the crate root; the
//! variants live in the private `types` module.

mod types;

pub use types::{LifecycleError, Result};
