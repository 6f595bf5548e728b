use std::collections::HashSet;

use serde_json::json;

use super::{Engine, LifecycleAuditStage};
use crate::error::{LifecycleError, Result};
use crate::logging::{LogLevel, PERSISTENCE_TARGET, json_kv};
use crate::navigation::{BackStack, NavigatorState, NodeRecord};
use crate::persistence::{Bundle, CompanionKey, CompanionSnapshot};
use crate::scene::NodeId;

const NAVIGATORS_KEY: &str = "navigators";
const COMPANIONS_KEY: &str = "companions";

/// Output of [`Engine::save_state`].
#[derive(Debug, Clone)]
pub struct SavedState {
    pub bundle: Bundle,
    pub fingerprint: blake3::Hash,
    /// False when the content matches the previous save.
    pub changed: bool,
}

impl Engine {
    /// Capture every navigation container and companion record.
    pub fn save_state(&mut self) -> Result<SavedState> {
        let containers: Vec<NodeId> = self.navigators.keys().collect();
        let mut navigators = Bundle::new();
        for container in containers {
            let Some(key) = self.scene.key(container).map(str::to_owned) else {
                continue;
            };
            let live = self
                .scene
                .children(container)
                .to_vec()
                .into_iter()
                .map(|child| self.record_of(child))
                .collect();
            let back_stack = self
                .navigators
                .get(container)
                .cloned()
                .unwrap_or_default();
            navigators.put(key, &NavigatorState { live, back_stack })?;
        }

        let companions = self.companions.snapshot();
        let mut bundle = Bundle::new();
        let navigator_count = navigators.len();
        bundle.put_bundle(NAVIGATORS_KEY, navigators);
        bundle.put(COMPANIONS_KEY, &companions)?;

        let fingerprint = bundle.fingerprint();
        let changed = self.last_saved != Some(fingerprint);
        self.last_saved = Some(fingerprint);

        self.log(
            LogLevel::Info,
            PERSISTENCE_TARGET,
            "state_saved",
            [
                json_kv("navigators", navigator_count),
                json_kv("companions", companions.len()),
                json_kv("changed", changed),
            ],
        );
        self.audit(
            LifecycleAuditStage::StateSaved,
            [
                ("navigators", json!(navigator_count)),
                ("fingerprint", json!(fingerprint.to_hex().to_string())),
            ],
        );

        Ok(SavedState {
            bundle,
            fingerprint,
            changed,
        })
    }

    /// Turn `container` into a navigation container, optionally rebuilding
    /// its children and back stack from a bundle produced by
    /// [`Engine::save_state`].
    pub fn attach_navigation(&mut self, container: NodeId, saved: Option<&Bundle>) -> Result<()> {
        self.require(container)?;
        if self.navigators.contains_key(container) {
            return Err(LifecycleError::DuplicateNavigation(self.label(container)));
        }
        let Some(key) = self.scene.key(container).map(str::to_owned) else {
            let type_name = self.scene.type_name(container).unwrap_or_default();
            return Err(LifecycleError::MissingIdentity(type_name.to_string()));
        };

        let state = match saved {
            Some(bundle) => self.read_saved(bundle, &key)?,
            None => NavigatorState::default(),
        };

        self.navigators.insert(container, BackStack::new());
        for child in self.scene.children(container).to_vec() {
            self.ensure_key(child);
        }
        self.attach_dispatcher(container)?;

        let mut restored = 0usize;
        for record in &state.live {
            let present = self
                .scene
                .children(container)
                .iter()
                .any(|child| self.scene.key(*child) == Some(record.key.as_str()));
            if present {
                continue;
            }
            match self.build_from_record(container, record) {
                Ok(node) => {
                    self.scene.add_child(container, node);
                    restored += 1;
                }
                Err(err) => {
                    self.restore_missed(record, &err.to_string());
                }
            }
        }

        for entry in state.back_stack.entries().iter().filter(|entry| !entry.reusable) {
            if let Some(node) = self.scene.find_key(entry.type_name(), entry.key()) {
                if let Some(node) = self.scene.node_mut(node) {
                    node.state.back_stack_item = true;
                }
            }
        }
        let depth = state.back_stack.len();
        self.navigators.insert(container, state.back_stack);
        self.pump();

        if saved.is_some() {
            self.log(
                LogLevel::Info,
                PERSISTENCE_TARGET,
                "state_restored",
                [
                    json_kv("container", self.label(container)),
                    json_kv("live", restored),
                    json_kv("depth", depth),
                ],
            );
            self.audit(
                LifecycleAuditStage::StateRestored,
                [
                    ("container", json!(self.label(container))),
                    ("live", json!(restored)),
                    ("depth", json!(depth)),
                ],
            );
        }
        Ok(())
    }

    /// Read the saved navigator for `key` and restore the companion records
    /// of its live nodes and stored entries. Records owned by other
    /// containers stay in the bundle.
    fn read_saved(&mut self, bundle: &Bundle, key: &str) -> Result<NavigatorState> {
        let state = match bundle.get_bundle(NAVIGATORS_KEY) {
            Some(navigators) => navigators.get::<NavigatorState>(key)?,
            None => None,
        }
        .unwrap_or_default();

        let owned: HashSet<CompanionKey> = state
            .live
            .iter()
            .map(NodeRecord::companion_key)
            .chain(
                state
                    .back_stack
                    .entries()
                    .iter()
                    .map(|entry| entry.record.companion_key()),
            )
            .collect();
        if let Some(snapshots) = bundle.get::<Vec<CompanionSnapshot>>(COMPANIONS_KEY)? {
            self.companions.restore(
                snapshots
                    .into_iter()
                    .filter(|snapshot| owned.contains(&snapshot.key))
                    .collect(),
            );
        }
        Ok(state)
    }
}
