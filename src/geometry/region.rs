use super::Rect;

/// Union of rectangles with exact containment queries.
///
/// The region stores the rects it was built from; coverage tests clip the
/// candidate against each stored rect until nothing remains, so overlapping
/// inputs are fine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.contains_rect(&rect) {
            return;
        }
        self.rects.retain(|existing| !rect.contains(existing));
        self.rects.push(rect);
    }

    /// True when unioning `rect` into this region would not change it.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut remaining = vec![*rect];
        for cover in &self.rects {
            let mut next = Vec::with_capacity(remaining.len());
            for piece in &remaining {
                next.extend(piece.subtract(cover));
            }
            if next.is_empty() {
                return true;
            }
            remaining = next;
        }
        false
    }
}
