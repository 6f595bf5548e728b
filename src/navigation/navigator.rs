use crate::error::Result;
use crate::runtime::Engine;
use crate::scene::NodeId;

use super::BackStackEntry;

/// Result of popping the back stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Nothing to go back to; the container is untouched.
    Empty,
    /// The entry below was rebuilt through the factory.
    Restored(NodeId),
    /// The entry below was still live and is now on top again.
    Revealed(NodeId),
    /// The entry below could not be brought back and was dropped.
    Unrestorable { type_name: String },
}

impl NavigationOutcome {
    /// Whether an entry was consumed.
    pub fn popped(&self) -> bool {
        !matches!(self, NavigationOutcome::Empty)
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            NavigationOutcome::Restored(node) | NavigationOutcome::Revealed(node) => Some(*node),
            _ => None,
        }
    }
}

/// Container-scoped navigation operations.
pub trait Navigator {
    /// Hide the current top behind a reusable entry and show `node`.
    fn forward(&mut self, node: NodeId) -> Result<()>;
    /// Show `node` above the current top, which stays live underneath.
    fn add(&mut self, node: NodeId) -> Result<()>;
    /// Destroy the top and bring back the entry below it.
    fn back(&mut self) -> bool;
    /// Pop down to the topmost entry of type `marker`, keeping it.
    fn back_to(&mut self, marker: &str) -> bool;
    /// Pop down to and including the topmost entry of type `marker`.
    fn back_including(&mut self, marker: &str) -> bool;
    /// Swap the current top for `node` without touching the stack.
    fn replace(&mut self, node: NodeId) -> Result<()>;
    /// Clear the stack and every live child, then show `node`.
    fn replace_all(&mut self, node: NodeId) -> Result<()>;
    fn depth(&self) -> usize;
}

/// Navigator bound to one container of an [`Engine`].
pub struct NavigatorHandle<'a> {
    engine: &'a mut Engine,
    container: NodeId,
}

impl<'a> NavigatorHandle<'a> {
    pub(crate) fn new(engine: &'a mut Engine, container: NodeId) -> Self {
        Self { engine, container }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Like [`Navigator::back`], reporting how the entry came back.
    pub fn try_back(&mut self) -> NavigationOutcome {
        self.engine.navigate_back(self.container)
    }

    /// Topmost live child.
    pub fn top(&self) -> Option<NodeId> {
        self.engine.children(self.container).last().copied()
    }

    pub fn entries(&self) -> &[BackStackEntry] {
        self.engine.back_stack_entries(self.container)
    }
}

impl Navigator for NavigatorHandle<'_> {
    fn forward(&mut self, node: NodeId) -> Result<()> {
        self.engine.navigate_forward(self.container, node, true)
    }

    fn add(&mut self, node: NodeId) -> Result<()> {
        self.engine.navigate_forward(self.container, node, false)
    }

    fn back(&mut self) -> bool {
        self.try_back().popped()
    }

    fn back_to(&mut self, marker: &str) -> bool {
        self.engine.navigate_back_to(self.container, marker, false)
    }

    fn back_including(&mut self, marker: &str) -> bool {
        self.engine.navigate_back_to(self.container, marker, true)
    }

    fn replace(&mut self, node: NodeId) -> Result<()> {
        self.engine.navigate_replace(self.container, node)
    }

    fn replace_all(&mut self, node: NodeId) -> Result<()> {
        self.engine.navigate_replace_all(self.container, node)
    }

    fn depth(&self) -> usize {
        self.engine.back_stack_entries(self.container).len()
    }
}
