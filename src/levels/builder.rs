use std::collections::HashSet;

use super::{LevelEntry, LevelSnapshot};
use crate::geometry::{Rect, Region};
use crate::scene::{Geometry, NodeId};

/// Assign an occlusion level to each rect, given in descending priority.
///
/// Covering regions are scanned deepest-first; the first one that fully
/// contains the rect places it one level below. Partial overlap never
/// counts as occlusion.
pub fn assign_levels(rects: &[Rect]) -> Vec<usize> {
    let mut covering: Vec<Region> = Vec::new();
    let mut levels = Vec::with_capacity(rects.len());

    for rect in rects {
        if rect.is_empty() {
            levels.push(0);
            continue;
        }

        let level = covering
            .iter()
            .rposition(|region| region.contains_rect(rect))
            .map(|index| index + 1)
            .unwrap_or(0);

        if level == covering.len() {
            covering.push(Region::new());
        }
        covering[level].union_rect(*rect);
        levels.push(level);
    }

    levels
}

/// Build a snapshot for `ordered` nodes (descending priority).
///
/// Nodes the geometry no longer knows are dropped; repeated ids keep their
/// first occurrence.
pub fn build_levels<G: Geometry + ?Sized>(geometry: &G, ordered: &[NodeId]) -> LevelSnapshot {
    let mut seen = HashSet::with_capacity(ordered.len());
    let mut nodes = Vec::with_capacity(ordered.len());
    let mut rects = Vec::with_capacity(ordered.len());

    for node in ordered {
        if !seen.insert(*node) {
            continue;
        }
        let Some(rect) = geometry.rect_in_window(*node) else {
            continue;
        };
        nodes.push(*node);
        rects.push(rect);
    }

    let entries = assign_levels(&rects)
        .into_iter()
        .zip(nodes)
        .map(|(level, node)| LevelEntry {
            node,
            level,
            visible: geometry.is_displayed(node),
        })
        .collect();

    LevelSnapshot::from_entries(entries)
}
