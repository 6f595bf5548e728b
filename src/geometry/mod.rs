//! Window-space geometry used by the occlusion level builder.

mod rect;
mod region;

pub use rect::Rect;
pub use region::Region;
