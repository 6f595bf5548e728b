//! Audit hooks for the engine's major checkpoints.
//!
//! Records carry a stage plus structured details so callers can buffer,
//! assert on, or forward them without touching the dispatch path.

use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

/// Checkpoints reported by [`Engine`](super::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAuditStage {
    /// A node was bound to a host lifecycle.
    RootBound,
    /// A container started dispatching to its children.
    DispatcherAttached,
    /// A container stopped dispatching.
    DispatcherDetached,
    /// Levels were recomputed for a container or hierarchy.
    LevelsComputed,
    /// A node changed effective state.
    TransitionApplied,
    /// A node reached the destroyed state.
    NodeDestroyed,
    /// A navigation operation completed.
    Navigated,
    /// A back-stack or live entry could not be rebuilt.
    RestoreMissed,
    StateSaved,
    StateRestored,
}

#[derive(Debug, Clone)]
pub struct LifecycleAuditEvent {
    pub timestamp: SystemTime,
    pub stage: LifecycleAuditStage,
    pub details: Vec<(String, Value)>,
}

impl LifecycleAuditEvent {
    fn new(stage: LifecycleAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

pub struct LifecycleAuditEventBuilder {
    event: LifecycleAuditEvent,
}

impl LifecycleAuditEventBuilder {
    pub fn new(stage: LifecycleAuditStage) -> Self {
        Self {
            event: LifecycleAuditEvent::new(stage),
        }
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn finish(self) -> LifecycleAuditEvent {
        self.event
    }
}

pub trait LifecycleAudit: Send + Sync {
    fn record(&self, event: LifecycleAuditEvent);
}

/// Default sink when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullLifecycleAudit;

impl LifecycleAudit for NullLifecycleAudit {
    fn record(&self, _event: LifecycleAuditEvent) {}
}

/// Keeps every record, mostly for tests and debugging sessions.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<LifecycleAuditEvent>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleAuditEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<LifecycleAuditStage> {
        self.events().into_iter().map(|event| event.stage).collect()
    }
}

impl LifecycleAudit for RecordingAudit {
    fn record(&self, event: LifecycleAuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}
