//! Per-container and per-root level dispatchers plus the deferred task queue
//! that coalesces layout passes.

mod container;
mod hierarchy;
mod scheduler;

pub use container::ContainerDispatcher;
pub use hierarchy::{HierarchyDispatcher, hierarchy_rank};
pub use scheduler::{Scheduler, Task};
