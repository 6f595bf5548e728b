use std::sync::RwLock;

use crate::lifecycle::LifecycleState;

/// The environment that owns a root node, such as a window or activity.
pub trait HostLifecycle: Send + Sync {
    fn name(&self) -> &str;
    fn current_state(&self) -> LifecycleState;
}

/// Host whose state is set directly by the embedding code.
#[derive(Debug)]
pub struct SharedHost {
    name: String,
    state: RwLock<LifecycleState>,
}

impl SharedHost {
    pub fn new(name: impl Into<String>, state: LifecycleState) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(state),
        }
    }

    pub fn set_state(&self, state: LifecycleState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }
}

impl HostLifecycle for SharedHost {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> LifecycleState {
        self.state
            .read()
            .map(|guard| *guard)
            .unwrap_or(LifecycleState::Destroyed)
    }
}
