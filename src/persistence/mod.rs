//! Key/value persistence medium and per-identity companion state.

mod bundle;
mod companion;
mod retained;

pub use bundle::Bundle;
pub use companion::{CompanionKey, CompanionRecord, CompanionSnapshot, CompanionStore};
pub use retained::{RetainedScope, RetainedScopeError};
