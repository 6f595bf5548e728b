use serde_json::json;

use super::{Engine, LifecycleAuditStage};
use crate::dispatch::Task;
use crate::levels::{LevelEntry, LevelOp};
use crate::lifecycle::{LifecycleState, Transition, gate};
use crate::logging::{DISPATCH_TARGET, ENGINE_TARGET, HIERARCHY_TARGET, LogLevel, json_kv};
use crate::persistence::CompanionKey;
use crate::scene::{NodeId, TreeEvent};

impl Engine {
    /// Record what the parent (or host) asks of `node` and re-gate it.
    pub(crate) fn request_state(&mut self, node: NodeId, requested: LifecycleState) {
        if requested == LifecycleState::Destroyed {
            self.destroy_node(node);
            return;
        }
        let Some(entry) = self.scene.node_mut(node) else {
            return;
        };
        if entry.destroying {
            return;
        }
        entry.state.requested = requested;
        self.reevaluate(node);
    }

    /// Apply the gating rule to the last request and cascade on change.
    pub(crate) fn reevaluate(&mut self, node: NodeId) {
        let Some(entry) = self.scene.node(node) else {
            return;
        };
        if entry.destroying {
            return;
        }
        let state = entry.state;
        let eligible =
            self.scene.is_displayed(node) && state.level == 0 && state.hierarchy_level == 0;
        let target = gate(state.requested, eligible);
        // nothing moves back to Initialized once created
        if target == state.current || target == LifecycleState::Initialized {
            return;
        }
        self.set_current(node, target);
        self.propagate(node, target);
    }

    pub(crate) fn set_current(&mut self, node: NodeId, to: LifecycleState) {
        let Some(entry) = self.scene.node_mut(node) else {
            return;
        };
        let from = entry.state.current;
        if from == to {
            return;
        }
        entry.state.current = to;
        let events = from.events_to(to);
        for observer in entry.observers.iter_mut() {
            for event in &events {
                observer.on_event(*event);
            }
        }

        self.transitions.push(Transition { node, from, to });
        self.with_metrics(|metrics| metrics.record_transition());
        self.log(
            LogLevel::Trace,
            ENGINE_TARGET,
            "transition",
            [
                json_kv("node", self.label(node)),
                json_kv("from", from.as_str()),
                json_kv("to", to.as_str()),
            ],
        );
        self.audit(
            LifecycleAuditStage::TransitionApplied,
            [
                ("node", json!(self.label(node))),
                ("from", json!(from.as_str())),
                ("to", json!(to.as_str())),
            ],
        );

        if from == LifecycleState::Initialized && to != LifecycleState::Destroyed {
            self.link_companion(node);
        }
    }

    /// Share arguments between a freshly created keyed node and its
    /// companion record.
    fn link_companion(&mut self, node: NodeId) {
        let Some(entry) = self.scene.node_mut(node) else {
            return;
        };
        let Some(key) = entry.key.clone() else {
            return;
        };
        let record = self
            .companions
            .get_or_create(&CompanionKey::new(entry.type_name.clone(), key));
        if entry.args.is_none() {
            entry.args = record.args.clone();
        } else if record.args.is_none() {
            record.args = entry.args.clone();
        }
    }

    fn propagate(&mut self, node: NodeId, state: LifecycleState) {
        if self.dispatchers.contains_key(node) {
            self.dispatch_ambient(node);
        } else {
            for child in self.scene.children(node).to_vec() {
                self.request_state(child, state);
            }
        }
    }

    /// Re-apply the last snapshot after the container's own state moved.
    fn dispatch_ambient(&mut self, container: NodeId) {
        let Some(ambient) = self.scene.state(container).map(|state| state.current) else {
            return;
        };
        let Some(dispatcher) = self.dispatchers.get_mut(container) else {
            return;
        };
        if !dispatcher.needs_dispatch(ambient) {
            return;
        }
        if dispatcher.snapshot().is_empty() {
            dispatcher.recompute(&self.scene);
        }
        dispatcher.mark_dispatched(ambient);
        let entries = dispatcher.snapshot().entries().to_vec();

        for entry in entries {
            self.apply_entry(container, entry, ambient);
        }
    }

    /// Recompute levels from current geometry and apply the diff.
    pub(crate) fn dispatch_layout(&mut self, container: NodeId) {
        let Some(ambient) = self.scene.state(container).map(|state| state.current) else {
            return;
        };
        let Some(dispatcher) = self.dispatchers.get_mut(container) else {
            return;
        };
        let reapply_all = dispatcher.needs_dispatch(ambient);
        let ops = dispatcher.recompute(&self.scene);
        dispatcher.mark_dispatched(ambient);
        let children = dispatcher.snapshot().len();
        let changes = ops.iter().filter(|op| op.is_effective()).count();

        self.with_metrics(|metrics| metrics.record_dispatch());
        self.log(
            LogLevel::Debug,
            DISPATCH_TARGET,
            "levels_computed",
            [
                json_kv("container", self.label(container)),
                json_kv("children", children),
                json_kv("changes", changes),
                json_kv("ambient", ambient.as_str()),
            ],
        );
        self.audit(
            LifecycleAuditStage::LevelsComputed,
            [
                ("container", json!(self.label(container))),
                ("children", json!(children)),
                ("changes", json!(changes)),
            ],
        );

        let mut removed = Vec::new();
        for op in ops {
            match op {
                LevelOp::Removed(entry) => removed.push(entry.node),
                LevelOp::Unchanged(_) if !reapply_all => {}
                other => self.apply_entry(container, *other.entry(), ambient),
            }
        }

        // nodes moved under another parent are that parent's business
        for node in removed {
            if self.scene.contains(node) && self.scene.parent(node).is_none() {
                self.destroy_node(node);
            }
        }
    }

    fn apply_entry(&mut self, container: NodeId, entry: LevelEntry, ambient: LifecycleState) {
        if self.scene.parent(entry.node) != Some(container) {
            return;
        }
        if let Some(node) = self.scene.node_mut(entry.node) {
            node.state.level = entry.level;
        }
        self.request_state(entry.node, ambient);
    }

    pub(crate) fn dispatch_hierarchy(&mut self, root: NodeId) {
        let Some(hierarchy) = self.hierarchies.get_mut(root) else {
            return;
        };
        if !hierarchy.is_active() {
            return;
        }
        let ops = hierarchy.recompute(&self.scene);
        let members = hierarchy.members().len();

        self.log(
            LogLevel::Debug,
            HIERARCHY_TARGET,
            "hierarchy_levels_computed",
            [
                json_kv("root", self.label(root)),
                json_kv("members", members),
            ],
        );

        for op in ops {
            match op {
                LevelOp::Unchanged(_) => {}
                LevelOp::Changed(entry) | LevelOp::Inserted(entry) => {
                    self.set_hierarchy_level(entry.node, entry.level)
                }
                LevelOp::Removed(entry) => self.set_hierarchy_level(entry.node, 0),
            }
        }
    }

    fn set_hierarchy_level(&mut self, container: NodeId, level: usize) {
        let Some(node) = self.scene.node_mut(container) else {
            return;
        };
        node.state.hierarchy_level = level;
        self.reevaluate(container);
    }

    fn refresh_hierarchy_of(&mut self, container: NodeId) {
        if let Some(root) = self
            .dispatchers
            .get(container)
            .and_then(|dispatcher| dispatcher.root())
        {
            self.dispatch_hierarchy(root);
        }
    }

    /// Drop the dispatcher for `container`, leaving its hierarchy. Returns
    /// whether one was attached.
    pub(crate) fn release_dispatcher(&mut self, container: NodeId) -> bool {
        let Some(dispatcher) = self.dispatchers.remove(container) else {
            return false;
        };
        self.scheduler.cancel(Task::Recompute(container));

        if let Some(root) = dispatcher.root() {
            let deactivated = self
                .hierarchies
                .get_mut(root)
                .is_some_and(|hierarchy| hierarchy.leave(container));
            if let Some(node) = self.scene.node_mut(container) {
                node.state.hierarchy_level = 0;
            }
            self.reevaluate(container);
            if deactivated {
                self.log(
                    LogLevel::Debug,
                    HIERARCHY_TARGET,
                    "hierarchy_detached",
                    [json_kv("root", self.label(root))],
                );
            } else {
                self.dispatch_hierarchy(root);
            }
        }

        self.audit(
            LifecycleAuditStage::DispatcherDetached,
            [("container", json!(self.label(container)))],
        );
        true
    }

    /// Drain queued tree notifications.
    pub(crate) fn pump(&mut self) {
        while let Some(event) = self.scene.pop_event() {
            self.handle_tree_event(event);
        }
    }

    fn handle_tree_event(&mut self, event: TreeEvent) {
        match event {
            TreeEvent::ChildAdded { parent, child } => {
                if self.scene.parent(child) != Some(parent) {
                    return;
                }
                if self.navigators.contains_key(parent) {
                    self.ensure_key(child);
                }
                if self.dispatchers.contains_key(parent) {
                    if !self.scene.is_attached(child) {
                        self.scheduler
                            .schedule(Task::DestroyOrphan(child), self.config.orphan_grace);
                    }
                    self.dispatch_layout(parent);
                    self.refresh_hierarchy_of(parent);
                } else if let Some(ambient) = self.scene.state(parent).map(|s| s.current) {
                    // plain parents never occlude
                    if let Some(node) = self.scene.node_mut(child) {
                        node.state.level = 0;
                    }
                    self.request_state(child, ambient);
                }
            }
            TreeEvent::ChildRemoved { parent, .. } => {
                if self.dispatchers.contains_key(parent) {
                    self.dispatch_layout(parent);
                    self.refresh_hierarchy_of(parent);
                }
            }
            TreeEvent::LayoutChanged(container) => {
                if self.dispatchers.contains_key(container) {
                    self.scheduler
                        .schedule(Task::Recompute(container), self.config.debounce);
                }
            }
            TreeEvent::VisibilityChanged(node) => {
                if !self.scene.contains(node) {
                    return;
                }
                self.reevaluate(node);
                if let Some(parent) = self.scene.parent(node) {
                    if self.dispatchers.contains_key(parent) {
                        self.scheduler
                            .schedule(Task::Recompute(parent), self.config.debounce);
                    }
                }
                self.refresh_hierarchy_of(node);
            }
            TreeEvent::Attached(node) | TreeEvent::Detached(node) => {
                if !self.scene.contains(node) {
                    return;
                }
                let subtree = self.scene.subtree(node);
                if matches!(event, TreeEvent::Attached(_)) {
                    for member in &subtree {
                        self.scheduler.cancel(Task::DestroyOrphan(*member));
                    }
                }
                self.reevaluate(node);
                for member in subtree {
                    if self.dispatchers.contains_key(member) {
                        self.scheduler
                            .schedule(Task::Recompute(member), self.config.debounce);
                    }
                }
            }
        }
    }

    pub(crate) fn run_task(&mut self, task: Task) {
        match task {
            Task::Recompute(container) => {
                if self.dispatchers.contains_key(container) {
                    self.dispatch_layout(container);
                    self.refresh_hierarchy_of(container);
                }
            }
            Task::DestroyOrphan(node) => {
                if self.scene.contains(node) && !self.scene.is_attached(node) {
                    self.log(
                        LogLevel::Debug,
                        ENGINE_TARGET,
                        "orphan_destroyed",
                        [json_kv("node", self.label(node))],
                    );
                    self.destroy_node(node);
                }
            }
        }
    }

    /// Post-order destroy of `node` and its subtree.
    pub(crate) fn destroy_node(&mut self, node: NodeId) {
        let Some(entry) = self.scene.node_mut(node) else {
            return;
        };
        if entry.destroying {
            return;
        }
        entry.destroying = true;
        let children = entry.children.clone();
        for child in children {
            self.destroy_node(child);
        }

        let label = self.label(node);
        self.release_dispatcher(node);
        if let Some(stack) = self.navigators.remove(node) {
            for entry in stack.entries() {
                self.companions.release(&entry.record.companion_key());
            }
        }
        if self.roots.remove(node).is_some() {
            self.hierarchies.remove(node);
        }
        self.scheduler.cancel_for(node);

        self.set_current(node, LifecycleState::Destroyed);

        let Some(removed) = self.scene.remove(node) else {
            return;
        };
        if !removed.state.back_stack_item {
            if let Some(key) = removed.key {
                self.companions
                    .release(&CompanionKey::new(removed.type_name, key));
            }
        }

        self.with_metrics(|metrics| metrics.record_destroyed());
        self.log(
            LogLevel::Debug,
            ENGINE_TARGET,
            "node_destroyed",
            [json_kv("node", label.clone())],
        );
        self.audit(LifecycleAuditStage::NodeDestroyed, [("node", json!(label))]);
    }
}
