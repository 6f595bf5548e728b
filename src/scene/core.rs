use std::collections::VecDeque;

use serde_json::Value;
use slotmap::SlotMap;

use crate::geometry::Rect;
use crate::lifecycle::{LifecycleObserver, LifecycleState};
use crate::persistence::Bundle;

slotmap::new_key_type! {
    /// Stable handle to a node for as long as the node is alive.
    pub struct NodeId;
}

/// Blueprint for a new node, supplied by the host or by a node factory.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub type_name: String,
    pub key: Option<String>,
    pub rect: Rect,
    pub z: i32,
    pub visible: bool,
    pub args: Option<Value>,
}

impl NodeSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            key: None,
            rect: Rect::default(),
            z: 0,
            visible: true,
            args: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Lifecycle bookkeeping for one node, mutated only by the engine's
/// transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeState {
    /// Last state imposed by the parent dispatcher or host.
    pub requested: LifecycleState,
    /// Effective state after gating.
    pub current: LifecycleState,
    /// Occlusion level inside the parent container.
    pub level: usize,
    /// Occlusion level of this container inside its root's hierarchy.
    pub hierarchy_level: usize,
    /// Set while the node is represented by an entry on a back stack.
    pub back_stack_item: bool,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            requested: LifecycleState::Initialized,
            current: LifecycleState::Initialized,
            level: 0,
            hierarchy_level: 0,
            back_stack_item: false,
        }
    }
}

/// Notifications produced by tree mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    ChildAdded { parent: NodeId, child: NodeId },
    ChildRemoved { parent: NodeId, child: NodeId },
    LayoutChanged(NodeId),
    VisibilityChanged(NodeId),
    Attached(NodeId),
    Detached(NodeId),
}

pub(crate) struct Node {
    pub(crate) type_name: String,
    pub(crate) key: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) rect: Rect,
    pub(crate) z: i32,
    pub(crate) visible: bool,
    /// Only meaningful on parentless nodes: the node hosts a live surface.
    pub(crate) surface: bool,
    pub(crate) args: Option<Value>,
    pub(crate) transient: Bundle,
    pub(crate) state: NodeState,
    pub(crate) observers: Vec<Box<dyn LifecycleObserver>>,
    pub(crate) destroying: bool,
}

impl Node {
    fn from_spec(spec: NodeSpec) -> Self {
        Self {
            type_name: spec.type_name,
            key: spec.key,
            parent: None,
            children: Vec::new(),
            rect: spec.rect,
            z: spec.z,
            visible: spec.visible,
            surface: false,
            args: spec.args,
            transient: Bundle::new(),
            state: NodeState::default(),
            observers: Vec::new(),
            destroying: false,
        }
    }
}

/// The node tree mirrored from the host toolkit.
#[derive(Default)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    events: VecDeque<TreeEvent>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: NodeSpec) -> NodeId {
        self.nodes.insert(Node::from_spec(spec))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Live node with the given identity, if any.
    pub fn find_key(&self, type_name: &str, key: &str) -> Option<NodeId> {
        self.nodes.iter().find_map(|(id, node)| {
            (node.type_name == type_name && node.key.as_deref() == Some(key)).then_some(id)
        })
    }

    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(id).map(|node| node.state)
    }

    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|node| node.type_name.as_str())
    }

    pub fn key(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).and_then(|node| node.key.as_deref())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain
    }

    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// `id` and every node below it, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if !self.contains(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.nodes.get(current) else {
                return false;
            };
            match node.parent {
                Some(parent) => current = parent,
                None => return node.surface,
            }
        }
    }

    pub fn is_displayed(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.visible) && self.is_attached(id)
    }

    /// Append `child` to `parent`, detaching it from any previous parent first.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        if parent == child
            || !self.contains(parent)
            || !self.contains(child)
            || self.is_descendant_of(parent, child)
        {
            return false;
        }
        if let Some(previous) = self.parent(child) {
            self.remove_child(previous, child);
        }

        let was_attached = self.is_attached(child);
        if let Some(node) = self.nodes.get_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }

        self.events.push_back(TreeEvent::ChildAdded { parent, child });
        if !was_attached && self.is_attached(child) {
            self.events.push_back(TreeEvent::Attached(child));
        }
        true
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let was_attached = self.is_attached(child);
        let Some(node) = self.nodes.get_mut(parent) else {
            return false;
        };
        let Some(position) = node.children.iter().position(|c| *c == child) else {
            return false;
        };
        node.children.remove(position);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }

        self.events.push_back(TreeEvent::ChildRemoved { parent, child });
        if was_attached {
            self.events.push_back(TreeEvent::Detached(child));
        }
        true
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.rect == rect {
            return;
        }
        node.rect = rect;
        let parent = node.parent;
        self.push_layout_change(id, parent);
    }

    pub fn set_z(&mut self, id: NodeId, z: i32) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.z == z {
            return;
        }
        node.z = z;
        let parent = node.parent;
        self.push_layout_change(id, parent);
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.visible == visible {
            return;
        }
        node.visible = visible;
        self.events.push_back(TreeEvent::VisibilityChanged(id));
    }

    /// Mark a parentless node as hosting (or no longer hosting) a live surface.
    pub fn set_surface(&mut self, id: NodeId, attached: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.parent.is_some() || node.surface == attached {
            return;
        }
        node.surface = attached;
        self.events.push_back(if attached {
            TreeEvent::Attached(id)
        } else {
            TreeEvent::Detached(id)
        });
    }

    fn push_layout_change(&mut self, id: NodeId, parent: Option<NodeId>) {
        // a moved child relayouts its parent; a moved container relayouts itself
        if let Some(parent) = parent {
            self.events.push_back(TreeEvent::LayoutChanged(parent));
        }
        if !self.children(id).is_empty() {
            self.events.push_back(TreeEvent::LayoutChanged(id));
        }
    }

    /// Free the node's slot, detaching it from its parent. Children must
    /// already be gone.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        if let Some(parent) = self.parent(id) {
            self.remove_child(parent, id);
        }
        let node = self.nodes.remove(id)?;
        for child in &node.children {
            if let Some(orphan) = self.nodes.get_mut(*child) {
                orphan.parent = None;
            }
        }
        Some(node)
    }

    pub fn pop_event(&mut self) -> Option<TreeEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_surface() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let root = scene.insert(NodeSpec::new("Root").with_key("root"));
        scene.set_surface(root, true);
        while scene.pop_event().is_some() {}
        (scene, root)
    }

    #[test]
    fn attaching_under_surface_reports_attach() {
        let (mut scene, root) = scene_with_surface();
        let child = scene.insert(NodeSpec::new("Child"));
        assert!(!scene.is_attached(child));

        assert!(scene.add_child(root, child));
        assert!(scene.is_displayed(child));
        assert_eq!(
            scene.pop_event(),
            Some(TreeEvent::ChildAdded {
                parent: root,
                child
            })
        );
        assert_eq!(scene.pop_event(), Some(TreeEvent::Attached(child)));
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut scene, root) = scene_with_surface();
        let child = scene.insert(NodeSpec::new("Child"));
        scene.add_child(root, child);
        assert!(!scene.add_child(child, root));
        assert!(!scene.add_child(child, child));
    }

    #[test]
    fn hidden_nodes_are_not_displayed() {
        let (mut scene, root) = scene_with_surface();
        let child = scene.insert(NodeSpec::new("Child").hidden());
        scene.add_child(root, child);
        assert!(scene.is_attached(child));
        assert!(!scene.is_displayed(child));
    }

    #[test]
    fn moving_a_child_relayouts_its_parent() {
        let (mut scene, root) = scene_with_surface();
        let child = scene.insert(NodeSpec::new("Child"));
        scene.add_child(root, child);
        while scene.pop_event().is_some() {}

        scene.set_rect(child, Rect::new(1, 1, 4, 4));
        assert_eq!(scene.pop_event(), Some(TreeEvent::LayoutChanged(root)));
        assert_eq!(scene.pop_event(), None);
    }

    #[test]
    fn removed_slots_stop_resolving() {
        let (mut scene, root) = scene_with_surface();
        let child = scene.insert(NodeSpec::new("Child"));
        scene.add_child(root, child);
        scene.remove(child);
        assert!(!scene.contains(child));
        assert!(scene.children(root).is_empty());
        assert!(scene.state(child).is_none());
    }
}
