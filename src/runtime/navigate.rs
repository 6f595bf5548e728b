use serde_json::json;

use super::{Engine, LifecycleAuditStage};
use crate::error::{LifecycleError, Result};
use crate::logging::{LogLevel, NAVIGATION_TARGET, json_kv};
use crate::navigation::{
    BackStack, BackStackEntry, FactoryContext, NavigationOutcome, NavigatorHandle, NodeRecord,
};
use crate::persistence::CompanionKey;
use crate::scene::NodeId;

impl Engine {
    /// Navigator for a container with navigation attached.
    pub fn navigator(&mut self, container: NodeId) -> Result<NavigatorHandle<'_>> {
        self.require_navigation(container)?;
        Ok(NavigatorHandle::new(self, container))
    }

    pub fn has_navigation(&self, container: NodeId) -> bool {
        self.navigators.contains_key(container)
    }

    pub fn back_stack_entries(&self, container: NodeId) -> &[BackStackEntry] {
        self.navigators
            .get(container)
            .map(BackStack::entries)
            .unwrap_or(&[])
    }

    /// Stop navigating `container`. Live children stay; stored entries and
    /// the companion records of nodes that are gone are dropped.
    pub fn detach_navigation(&mut self, container: NodeId) -> Result<()> {
        self.require(container)?;
        let stack = self
            .navigators
            .remove(container)
            .ok_or_else(|| LifecycleError::NavigationNotAttached(self.label(container)))?;
        for entry in stack.entries() {
            match self.scene.find_key(entry.type_name(), entry.key()) {
                Some(node) if !entry.reusable => {
                    if let Some(live) = self.scene.node_mut(node) {
                        live.state.back_stack_item = false;
                    }
                }
                _ => {
                    self.companions.release(&entry.record.companion_key());
                }
            }
        }
        self.detach_dispatcher(container)
    }

    fn require_navigation(&self, container: NodeId) -> Result<()> {
        self.require(container)?;
        if self.navigators.contains_key(container) {
            Ok(())
        } else {
            Err(LifecycleError::NavigationNotAttached(self.label(container)))
        }
    }

    pub(crate) fn navigate_forward(
        &mut self,
        container: NodeId,
        node: NodeId,
        reusable: bool,
    ) -> Result<()> {
        self.require_navigation(container)?;
        self.require(node)?;

        let mut removed = None;
        if let Some(top) = self.scene.children(container).last().copied() {
            if top == node {
                return Ok(());
            }
            let record = self.record_of(top);
            if let Some(entry) = self.scene.node_mut(top) {
                entry.state.back_stack_item = true;
            }
            if let Some(stack) = self.navigators.get_mut(container) {
                stack.push(BackStackEntry { record, reusable });
            }
            if reusable {
                self.scene.remove_child(container, top);
                removed = Some(top);
            }
        }

        self.ensure_key(node);
        self.scene.add_child(container, node);
        self.pump();
        self.destroy_removed(removed);
        self.navigated(container, if reusable { "forward" } else { "add" });
        Ok(())
    }

    pub(crate) fn navigate_back(&mut self, container: NodeId) -> NavigationOutcome {
        let has_entries = self
            .navigators
            .get(container)
            .is_some_and(|stack| !stack.is_empty());
        let Some(top) = self.scene.children(container).last().copied() else {
            return NavigationOutcome::Empty;
        };
        if !has_entries {
            return NavigationOutcome::Empty;
        }

        self.scene.remove_child(container, top);
        let outcome = self.restore_last_entry(container);
        self.pump();
        self.destroy_removed([top]);
        self.navigated(container, "back");
        outcome
    }

    pub(crate) fn navigate_back_to(
        &mut self,
        container: NodeId,
        marker: &str,
        inclusive: bool,
    ) -> bool {
        let Some(index) = self
            .navigators
            .get(container)
            .and_then(|stack| stack.position_of(marker))
        else {
            return false;
        };
        if inclusive && index < 1 {
            return false;
        }
        let Some(top) = self.scene.children(container).last().copied() else {
            return false;
        };

        self.scene.remove_child(container, top);
        let keep = if inclusive { index - 1 } else { index };
        let popped = self
            .navigators
            .get_mut(container)
            .map(|stack| stack.truncate_above(keep))
            .unwrap_or_default();
        let mut removed = vec![top];
        for entry in &popped {
            removed.extend(self.discard_entry(container, entry));
        }
        self.restore_last_entry(container);
        self.pump();
        self.destroy_removed(removed);
        self.navigated(
            container,
            if inclusive { "back_including" } else { "back_to" },
        );
        true
    }

    pub(crate) fn navigate_replace(&mut self, container: NodeId, node: NodeId) -> Result<()> {
        self.require_navigation(container)?;
        self.require(node)?;

        let previous = self.scene.children(container).last().copied();
        if previous == Some(node) {
            return Ok(());
        }
        self.ensure_key(node);
        self.scene.add_child(container, node);
        if let Some(previous) = previous {
            self.scene.remove_child(container, previous);
        }
        self.pump();
        self.destroy_removed(previous);
        self.navigated(container, "replace");
        Ok(())
    }

    pub(crate) fn navigate_replace_all(&mut self, container: NodeId, node: NodeId) -> Result<()> {
        self.require_navigation(container)?;
        self.require(node)?;

        let mut removed = Vec::new();
        for child in self.scene.children(container).to_vec().into_iter().rev() {
            if child == node {
                continue;
            }
            if let Some(entry) = self.scene.node_mut(child) {
                entry.state.back_stack_item = false;
            }
            self.scene.remove_child(container, child);
            removed.push(child);
        }
        let popped = self
            .navigators
            .get_mut(container)
            .map(BackStack::drain)
            .unwrap_or_default();
        for entry in &popped {
            self.companions.release(&entry.record.companion_key());
        }

        self.ensure_key(node);
        if self.scene.parent(node) != Some(container) {
            self.scene.add_child(container, node);
        }
        self.pump();
        self.destroy_removed(removed);
        self.navigated(container, "replace_all");
        Ok(())
    }

    /// Pop the top entry and bring it back into the container.
    fn restore_last_entry(&mut self, container: NodeId) -> NavigationOutcome {
        let Some(entry) = self
            .navigators
            .get_mut(container)
            .and_then(BackStack::pop)
        else {
            return NavigationOutcome::Empty;
        };

        if !entry.reusable {
            return match self.live_child(container, &entry) {
                Some(node) => {
                    if let Some(state) = self.scene.node_mut(node) {
                        state.state.back_stack_item = false;
                    }
                    NavigationOutcome::Revealed(node)
                }
                None => self.restore_missed(
                    &entry.record,
                    &LifecycleError::NodeNotFound.to_string(),
                ),
            };
        }

        match self.build_from_record(container, &entry.record) {
            Ok(node) => {
                self.scene.add_child(container, node);
                NavigationOutcome::Restored(node)
            }
            Err(err) => self.restore_missed(&entry.record, &err.to_string()),
        }
    }

    /// Forget an entry that will never be restored. Returns the live node it
    /// took out of the container, if any.
    fn discard_entry(&mut self, container: NodeId, entry: &BackStackEntry) -> Option<NodeId> {
        let mut removed = None;
        if !entry.reusable {
            if let Some(node) = self.live_child(container, entry) {
                if let Some(state) = self.scene.node_mut(node) {
                    state.state.back_stack_item = false;
                }
                self.scene.remove_child(container, node);
                removed = Some(node);
            }
        }
        self.companions.release(&entry.record.companion_key());
        removed
    }

    fn live_child(&self, container: NodeId, entry: &BackStackEntry) -> Option<NodeId> {
        self.scene.children(container).iter().copied().find(|child| {
            self.scene.type_name(*child) == Some(entry.type_name())
                && self.scene.key(*child) == Some(entry.key())
        })
    }

    /// Destroy nodes a navigation step took out of its container. A
    /// dispatching container has usually done so already.
    fn destroy_removed(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            if self.scene.contains(node) && self.scene.parent(node).is_none() {
                self.destroy_node(node);
            }
        }
        self.pump();
    }

    pub(crate) fn restore_missed(&mut self, record: &NodeRecord, reason: &str) -> NavigationOutcome {
        self.companions.release(&record.companion_key());
        self.with_metrics(|metrics| metrics.record_restore_miss());
        self.log(
            LogLevel::Warn,
            NAVIGATION_TARGET,
            "restore_missed",
            [
                json_kv("type", record.type_name.as_str()),
                json_kv("key", record.key.as_str()),
                json_kv("reason", reason),
            ],
        );
        self.audit(
            LifecycleAuditStage::RestoreMissed,
            [
                ("type", json!(record.type_name)),
                ("key", json!(record.key)),
            ],
        );
        NavigationOutcome::Unrestorable {
            type_name: record.type_name.clone(),
        }
    }

    /// Build a detached node for `record` through the factory.
    pub(crate) fn build_from_record(
        &mut self,
        container: NodeId,
        record: &NodeRecord,
    ) -> Result<NodeId> {
        let mut spec = {
            let ctx = FactoryContext {
                container: Some(container),
                container_key: self.scene.key(container),
                type_name: &record.type_name,
                key: &record.key,
                args: record.args.as_ref(),
            };
            self.factory.create(&ctx)?
        };
        spec.type_name = record.type_name.clone();
        spec.key = Some(record.key.clone());
        if spec.args.is_none() {
            spec.args = record.args.clone();
        }

        let node = self.scene.insert(spec);
        if let Some(entry) = self.scene.node_mut(node) {
            entry.transient = record.state.clone();
        }
        Ok(node)
    }

    /// Snapshot of a live node, assigning it a key if it has none.
    pub(crate) fn record_of(&mut self, node: NodeId) -> NodeRecord {
        let key = self.ensure_key(node);
        let (type_name, args, state) = match self.scene.node(node) {
            Some(entry) => (
                entry.type_name.clone(),
                entry.args.clone(),
                entry.transient.clone(),
            ),
            None => Default::default(),
        };
        NodeRecord {
            type_name,
            key,
            args,
            state,
        }
    }

    /// Give `node` a generated key unless it already has one.
    pub(crate) fn ensure_key(&mut self, node: NodeId) -> String {
        let Some(entry) = self.scene.node(node) else {
            return String::new();
        };
        if let Some(key) = entry.key.clone() {
            return key;
        }
        let type_name = entry.type_name.clone();
        let key = loop {
            self.generated_keys += 1;
            let candidate = format!("{type_name}#{}", self.generated_keys);
            if !self.key_in_use(&type_name, &candidate) {
                break candidate;
            }
        };
        if let Some(entry) = self.scene.node_mut(node) {
            entry.key = Some(key.clone());
        }
        key
    }

    fn key_in_use(&self, type_name: &str, key: &str) -> bool {
        self.companions
            .contains(&CompanionKey::new(type_name, key))
            || self.scene.find_key(type_name, key).is_some()
            || self.navigators.values().any(|stack| {
                stack
                    .entries()
                    .iter()
                    .any(|entry| entry.type_name() == type_name && entry.key() == key)
            })
    }

    fn navigated(&self, container: NodeId, op: &str) {
        let depth = self.back_stack_entries(container).len();
        self.with_metrics(|metrics| metrics.record_navigation());
        self.log(
            LogLevel::Info,
            NAVIGATION_TARGET,
            "navigated",
            [
                json_kv("container", self.label(container)),
                json_kv("op", op),
                json_kv("depth", depth),
            ],
        );
        self.audit(
            LifecycleAuditStage::Navigated,
            [
                ("container", json!(self.label(container))),
                ("op", json!(op)),
                ("depth", json!(depth)),
            ],
        );
    }
}
