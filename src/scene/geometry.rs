use std::cmp::Reverse;

use super::{NodeId, Scene};
use crate::geometry::Rect;

/// Read-only view of the host tree consumed by the level builder and the
/// dispatchers.
pub trait Geometry {
    fn children_of(&self, container: NodeId) -> Vec<NodeId>;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn rect_in_window(&self, node: NodeId) -> Option<Rect>;
    fn z_order(&self, node: NodeId) -> Option<i32>;
    fn is_displayed(&self, node: NodeId) -> bool;
}

impl Geometry for Scene {
    fn children_of(&self, container: NodeId) -> Vec<NodeId> {
        self.children(container).to_vec()
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }

    fn rect_in_window(&self, node: NodeId) -> Option<Rect> {
        self.node(node).map(|node| node.rect)
    }

    fn z_order(&self, node: NodeId) -> Option<i32> {
        self.node(node).map(|node| node.z)
    }

    fn is_displayed(&self, node: NodeId) -> bool {
        Scene::is_displayed(self, node)
    }
}

/// Children of `container` sorted by descending display priority: highest
/// z first, later children before earlier ones on ties.
pub fn priority_order<G: Geometry + ?Sized>(geometry: &G, container: NodeId) -> Vec<NodeId> {
    let mut ordered: Vec<(usize, NodeId)> = geometry
        .children_of(container)
        .into_iter()
        .enumerate()
        .collect();
    ordered.sort_by_key(|(index, node)| {
        (
            Reverse(geometry.z_order(*node).unwrap_or(i32::MIN)),
            Reverse(*index),
        )
    });
    ordered.into_iter().map(|(_, node)| node).collect()
}
