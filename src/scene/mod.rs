//! Node arena and the geometry/tree adapter consumed by the dispatchers.
//!
//! Nodes live in a slot map; a [`NodeId`] stays valid until the node is
//! destroyed, at which point its slot is freed and stale ids simply stop
//! resolving. Structural and layout changes are queued as [`TreeEvent`]s and
//! drained by the engine on the dispatch thread.

mod core;
mod geometry;

pub use core::{NodeId, NodeSpec, NodeState, Scene, TreeEvent};
pub use geometry::{Geometry, priority_order};
