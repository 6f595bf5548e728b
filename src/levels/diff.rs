use std::collections::{HashMap, HashSet};

use super::{LevelEntry, LevelSnapshot};

/// One step of a snapshot diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOp {
    Unchanged(LevelEntry),
    Changed(LevelEntry),
    Inserted(LevelEntry),
    Removed(LevelEntry),
}

impl LevelOp {
    pub fn entry(&self) -> &LevelEntry {
        match self {
            LevelOp::Unchanged(entry)
            | LevelOp::Changed(entry)
            | LevelOp::Inserted(entry)
            | LevelOp::Removed(entry) => entry,
        }
    }

    /// Whether applying this op requires touching the node.
    pub fn is_effective(&self) -> bool {
        !matches!(self, LevelOp::Unchanged(_))
    }
}

/// Compare two snapshots by node identity, treating `(level, visible)` as
/// the payload.
///
/// Ops follow the new snapshot's order; removals come last, in the old
/// snapshot's order, so they are applied after every surviving node.
pub fn diff_levels(old: &LevelSnapshot, new: &LevelSnapshot) -> Vec<LevelOp> {
    let previous: HashMap<_, _> = old
        .entries()
        .iter()
        .map(|entry| (entry.node, (entry.level, entry.visible)))
        .collect();
    let mut present = HashSet::with_capacity(new.len());
    let mut ops = Vec::with_capacity(new.len() + old.len());

    for entry in new.entries() {
        present.insert(entry.node);
        let op = match previous.get(&entry.node) {
            None => LevelOp::Inserted(*entry),
            Some(&(level, visible)) if level == entry.level && visible == entry.visible => {
                LevelOp::Unchanged(*entry)
            }
            Some(_) => LevelOp::Changed(*entry),
        };
        ops.push(op);
    }

    ops.extend(
        old.entries()
            .iter()
            .filter(|entry| !present.contains(&entry.node))
            .map(|entry| LevelOp::Removed(*entry)),
    );

    ops
}
