//! Occlusion levels for sibling regions and the diff between two passes.

mod builder;
mod diff;

pub use builder::{assign_levels, build_levels};
pub use diff::{LevelOp, diff_levels};

use crate::scene::NodeId;

/// One node's placement at the last layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelEntry {
    pub node: NodeId,
    pub level: usize,
    pub visible: bool,
}

/// Level assignment for one container's children (or one hierarchy's
/// containers), ordered by level and then by priority within a level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelSnapshot {
    entries: Vec<LevelEntry>,
}

impl LevelSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(mut entries: Vec<LevelEntry>) -> Self {
        entries.sort_by_key(|entry| entry.level);
        Self { entries }
    }

    pub fn entries(&self) -> &[LevelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn level_of(&self, node: NodeId) -> Option<usize> {
        self.entry(node).map(|entry| entry.level)
    }

    pub fn entry(&self, node: NodeId) -> Option<&LevelEntry> {
        self.entries.iter().find(|entry| entry.node == node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entry(node).is_some()
    }

    /// Number of distinct levels present.
    pub fn depth(&self) -> usize {
        self.entries
            .last()
            .map(|entry| entry.level + 1)
            .unwrap_or(0)
    }
}
