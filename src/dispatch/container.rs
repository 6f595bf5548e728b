use crate::levels::{LevelOp, LevelSnapshot, build_levels, diff_levels};
use crate::lifecycle::LifecycleState;
use crate::scene::{Geometry, NodeId, priority_order};

/// Level bookkeeping for one dispatching container.
///
/// The dispatcher only computes; applying the resulting transitions is the
/// engine's job, which keeps every mutation on one queue.
#[derive(Debug, Clone)]
pub struct ContainerDispatcher {
    container: NodeId,
    root: Option<NodeId>,
    snapshot: LevelSnapshot,
    last_dispatched: Option<LifecycleState>,
}

impl ContainerDispatcher {
    pub fn new(container: NodeId, root: Option<NodeId>) -> Self {
        Self {
            container,
            root,
            snapshot: LevelSnapshot::new(),
            last_dispatched: None,
        }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Root whose hierarchy this container belongs to, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn snapshot(&self) -> &LevelSnapshot {
        &self.snapshot
    }

    pub fn level_of(&self, node: NodeId) -> Option<usize> {
        self.snapshot.level_of(node)
    }

    /// Rebuild levels from current geometry, swap the snapshot in and return
    /// the diff against the previous one.
    pub fn recompute<G: Geometry + ?Sized>(&mut self, geometry: &G) -> Vec<LevelOp> {
        let ordered = priority_order(geometry, self.container);
        let next = build_levels(geometry, &ordered);
        let ops = diff_levels(&self.snapshot, &next);
        self.snapshot = next;
        ops
    }

    /// Whether re-applying the snapshot under `ambient` would do anything.
    pub fn needs_dispatch(&self, ambient: LifecycleState) -> bool {
        self.last_dispatched != Some(ambient)
    }

    pub fn mark_dispatched(&mut self, ambient: LifecycleState) {
        self.last_dispatched = Some(ambient);
    }
}
