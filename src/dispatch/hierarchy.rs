use std::cmp::Ordering;

use crate::levels::{LevelEntry, LevelOp, LevelSnapshot, assign_levels, diff_levels};
use crate::scene::{Geometry, NodeId, priority_order};

/// Ranks the dispatching containers under one root against each other.
///
/// Membership is reference counted by container: the hierarchy becomes
/// active with its first member and goes idle when the last one leaves.
#[derive(Debug, Clone)]
pub struct HierarchyDispatcher {
    root: NodeId,
    members: Vec<NodeId>,
    snapshot: LevelSnapshot,
}

impl HierarchyDispatcher {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            members: Vec::new(),
            snapshot: LevelSnapshot::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn is_active(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn snapshot(&self) -> &LevelSnapshot {
        &self.snapshot
    }

    /// Returns true when this join activated the hierarchy.
    pub fn join(&mut self, container: NodeId) -> bool {
        if self.members.contains(&container) {
            return false;
        }
        self.members.push(container);
        self.members.len() == 1
    }

    /// Returns true when this leave deactivated the hierarchy.
    pub fn leave(&mut self, container: NodeId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| *member != container);
        let left = before != self.members.len();
        if left && self.members.is_empty() {
            self.snapshot = LevelSnapshot::new();
            return true;
        }
        false
    }

    /// Members in descending priority: displayed first, then non-empty,
    /// then by rank.
    pub fn ordered_members<G: Geometry + ?Sized>(&self, geometry: &G) -> Vec<NodeId> {
        let mut keyed: Vec<(bool, bool, f64, NodeId)> = self
            .members
            .iter()
            .map(|member| {
                (
                    geometry.is_displayed(*member),
                    !geometry.children_of(*member).is_empty(),
                    hierarchy_rank(geometry, self.root, *member),
                    *member,
                )
            })
            .collect();
        keyed.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(b.1.cmp(&a.1))
                .then(b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
        });
        keyed.into_iter().map(|(_, _, _, member)| member).collect()
    }

    /// Rebuild member levels. Containers on the same ancestor chain never
    /// hide each other.
    pub fn recompute<G: Geometry + ?Sized>(&mut self, geometry: &G) -> Vec<LevelOp> {
        let ordered: Vec<_> = self
            .ordered_members(geometry)
            .into_iter()
            .filter_map(|member| geometry.rect_in_window(member).map(|rect| (member, rect)))
            .collect();

        let entries = ordered
            .iter()
            .enumerate()
            .map(|(index, (member, rect))| {
                let mut rects: Vec<_> = ordered[..index]
                    .iter()
                    .filter(|(other, _)| {
                        !is_nested_in(geometry, *other, *member)
                            && !is_nested_in(geometry, *member, *other)
                    })
                    .map(|(_, rect)| *rect)
                    .collect();
                rects.push(*rect);
                LevelEntry {
                    node: *member,
                    level: assign_levels(&rects).last().copied().unwrap_or(0),
                    visible: geometry.is_displayed(*member),
                }
            })
            .collect();
        let next = LevelSnapshot::from_entries(entries);
        let ops = diff_levels(&self.snapshot, &next);
        self.snapshot = next;
        ops
    }
}

fn is_nested_in<G: Geometry + ?Sized>(geometry: &G, node: NodeId, ancestor: NodeId) -> bool {
    let mut current = geometry.parent_of(node);
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        current = geometry.parent_of(parent);
    }
    false
}

/// Position of `container` in the root's drawing order, as a fraction in
/// `[0, 1)`. Each step down from the root splits the remaining rank space
/// between the siblings at that depth.
pub fn hierarchy_rank<G: Geometry + ?Sized>(geometry: &G, root: NodeId, container: NodeId) -> f64 {
    let mut path = vec![container];
    let mut current = container;
    while current != root {
        match geometry.parent_of(current) {
            Some(parent) => {
                path.push(parent);
                current = parent;
            }
            None => return 0.0,
        }
    }
    path.reverse();

    let mut rank = 0.0;
    let mut space = 1.0;
    for step in path.windows(2) {
        let (parent, child) = (step[0], step[1]);
        let mut drawing = priority_order(geometry, parent);
        drawing.reverse();
        let Some(ordinal) = drawing.iter().position(|node| *node == child) else {
            return rank;
        };
        space /= drawing.len() as f64;
        rank += ordinal as f64 * space;
    }
    rank
}
