use thiserror::Error;

use crate::persistence::RetainedScopeError;

/// Unified result type for the viewlife crate.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors surfaced by the lifecycle engine.
///
/// Everything here is a configuration error: a host binding that cannot work,
/// a node handle that no longer exists, or a type the factory cannot build.
/// Stale layout events and navigation misses never produce an error.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("root `{0}` requires a host lifecycle binding")]
    MissingHost(String),
    #[error("host `{0}` is already destroyed")]
    HostDestroyed(String),
    #[error("node `{0}` has a dispatching ancestor and cannot be bound as a root")]
    NotARoot(String),
    #[error("node `{0}` is already bound as a root")]
    AlreadyBound(String),
    #[error("node of type `{0}` has no stable identity")]
    MissingIdentity(String),
    #[error("node not found")]
    NodeNotFound,
    #[error("node `{0}` is not a container")]
    NotAContainer(String),
    #[error("navigation is not attached to `{0}`")]
    NavigationNotAttached(String),
    #[error("navigation is already attached to `{0}`")]
    DuplicateNavigation(String),
    #[error("node type `{0}` is not registered with the factory")]
    UnknownNodeType(String),
    #[error("companion state for `{0}` requires the node to be at least created")]
    NotCreated(String),
    #[error("retained scope error: {0}")]
    Retained(#[from] RetainedScopeError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
