//! Visibility-driven lifecycle propagation for trees of visual nodes.
//!
//! Nodes only reach `Started`/`Resumed` while they are displayed and not
//! fully covered by higher-priority siblings. Navigation containers keep a
//! back stack of nodes that can be rebuilt after a process restart.

pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod levels;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod navigation;
pub mod persistence;
pub mod runtime;
pub mod scene;

pub use dispatch::{ContainerDispatcher, HierarchyDispatcher, Scheduler, Task};
pub use error::{LifecycleError, Result};
pub use geometry::{Rect, Region};
pub use levels::{LevelEntry, LevelOp, LevelSnapshot, assign_levels, build_levels, diff_levels};
pub use lifecycle::{LifecycleEvent, LifecycleObserver, LifecycleState, Transition, gate};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, NullSink,
};
pub use metrics::{LifecycleMetrics, MetricSnapshot};
pub use navigation::{
    BackStack, BackStackEntry, FactoryContext, FactoryRegistry, NavigationOutcome, Navigator,
    NavigatorHandle, NavigatorState, NodeBuilder, NodeFactory, NodeRecord,
};
pub use persistence::{
    Bundle, CompanionKey, CompanionRecord, CompanionSnapshot, CompanionStore, RetainedScope,
    RetainedScopeError,
};
pub use runtime::{
    Engine, EngineConfig, HostLifecycle, LifecycleAudit, LifecycleAuditEvent,
    LifecycleAuditEventBuilder, LifecycleAuditStage, NullLifecycleAudit, RecordingAudit,
    SavedState, SharedHost,
};
pub use scene::{Geometry, NodeId, NodeSpec, NodeState, Scene, TreeEvent, priority_order};
