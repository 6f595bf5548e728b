//! Back-stack navigation for one container: the stack model, the factory
//! used to rebuild nodes from entries, and the container-scoped navigator.

mod back_stack;
mod factory;
mod navigator;

pub use back_stack::{BackStack, BackStackEntry, NavigatorState, NodeRecord};
pub use factory::{FactoryContext, FactoryRegistry, NodeBuilder, NodeFactory};
pub use navigator::{NavigationOutcome, Navigator, NavigatorHandle};
