use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::persistence::{Bundle, CompanionKey};

/// Everything needed to rebuild one node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub type_name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default)]
    pub state: Bundle,
}

impl NodeRecord {
    pub fn companion_key(&self) -> CompanionKey {
        CompanionKey::new(self.type_name.clone(), self.key.clone())
    }
}

/// A navigated-away-from node.
///
/// Reusable entries are rebuilt through the factory when revealed; the rest
/// refer to a node that stayed live underneath the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackStackEntry {
    #[serde(flatten)]
    pub record: NodeRecord,
    pub reusable: bool,
}

impl BackStackEntry {
    pub fn type_name(&self) -> &str {
        &self.record.type_name
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }
}

/// Tail-only stack of entries, serialized as a plain list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackStack {
    entries: Vec<BackStackEntry>,
}

impl BackStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BackStackEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<BackStackEntry> {
        self.entries.pop()
    }

    pub fn last(&self) -> Option<&BackStackEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BackStackEntry] {
        &self.entries
    }

    /// Index of the topmost entry with the given type name.
    pub fn position_of(&self, marker: &str) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.type_name() == marker)
    }

    /// Remove every entry above `index`, returning them top first.
    pub fn truncate_above(&mut self, index: usize) -> Vec<BackStackEntry> {
        let mut popped = Vec::new();
        while self.entries.len() > index + 1 {
            if let Some(entry) = self.entries.pop() {
                popped.push(entry);
            }
        }
        popped
    }

    /// Remove everything, top first.
    pub fn drain(&mut self) -> Vec<BackStackEntry> {
        let mut popped = std::mem::take(&mut self.entries);
        popped.reverse();
        popped
    }
}

/// Persisted form of one navigation container: the live children bottom to
/// top, plus the back stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigatorState {
    #[serde(default)]
    pub live: Vec<NodeRecord>,
    #[serde(default)]
    pub back_stack: BackStack,
}
