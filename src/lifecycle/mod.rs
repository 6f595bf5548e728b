//! Lifecycle states, the events between them, and per-node observers.

mod observer;
mod state;

pub use observer::LifecycleObserver;
pub use state::{LifecycleEvent, LifecycleState, Transition, gate};
