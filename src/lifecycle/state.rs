use serde::{Deserialize, Serialize};

use crate::scene::NodeId;

/// Coarse lifecycle state of a node.
///
/// Ordering follows the lifecycle: `Destroyed` is the lowest state so that
/// `state >= Started` reads naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

impl LifecycleState {
    pub fn is_at_least(self, other: LifecycleState) -> bool {
        self >= other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Destroyed => "destroyed",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Created => "created",
            LifecycleState::Started => "started",
            LifecycleState::Resumed => "resumed",
        }
    }

    /// Events emitted when moving from `self` to `target`, in order.
    ///
    /// `Destroyed` is terminal: nothing leaves it.
    pub fn events_to(self, target: LifecycleState) -> Vec<LifecycleEvent> {
        use LifecycleState::*;

        let mut events = Vec::new();
        if self == Destroyed || self == target {
            return events;
        }

        if target > self {
            let mut current = self;
            while current < target {
                let (event, next) = match current {
                    Initialized => (LifecycleEvent::OnCreate, Created),
                    Created => (LifecycleEvent::OnStart, Started),
                    Started => (LifecycleEvent::OnResume, Resumed),
                    Destroyed | Resumed => break,
                };
                events.push(event);
                current = next;
            }
        } else {
            let mut current = self;
            while current > target {
                let (event, next) = match current {
                    Resumed => (LifecycleEvent::OnPause, Started),
                    Started => (LifecycleEvent::OnStop, Created),
                    // nodes that never got created are destroyed silently
                    Created => (LifecycleEvent::OnDestroy, Destroyed),
                    Initialized => break,
                    Destroyed => break,
                };
                events.push(event);
                current = next;
            }
        }
        events
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    OnCreate,
    OnStart,
    OnResume,
    OnPause,
    OnStop,
    OnDestroy,
}

/// One recorded state change, in the order the engine applied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub node: NodeId,
    pub from: LifecycleState,
    pub to: LifecycleState,
}

/// Cap a requested state by what the node is currently allowed to reach.
///
/// `eligible` is true when the node is displayed and sits at occlusion level 0
/// both in its container and in its root's hierarchy.
pub fn gate(requested: LifecycleState, eligible: bool) -> LifecycleState {
    if requested.is_at_least(LifecycleState::Started) && !eligible {
        LifecycleState::Created
    } else {
        requested
    }
}
