use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use slotmap::SecondaryMap;

use crate::dispatch::{ContainerDispatcher, HierarchyDispatcher, Scheduler};
use crate::error::{LifecycleError, Result};
use crate::geometry::Rect;
use crate::lifecycle::{LifecycleObserver, LifecycleState, Transition};
use crate::logging::{self, ENGINE_TARGET, LogLevel, Logger, json_kv};
use crate::metrics::{LifecycleMetrics, MetricSnapshot};
use crate::navigation::{BackStack, FactoryContext, FactoryRegistry, NodeFactory};
use crate::persistence::{Bundle, CompanionKey, CompanionRecord, CompanionStore, RetainedScope};
use crate::scene::{NodeId, NodeSpec, NodeState, Scene};

mod audit;
mod dispatching;
mod host;
mod navigate;
mod saved;

#[cfg(test)]
mod tests;

pub use audit::{
    LifecycleAudit, LifecycleAuditEvent, LifecycleAuditEventBuilder, LifecycleAuditStage,
    NullLifecycleAudit, RecordingAudit,
};
pub use host::{HostLifecycle, SharedHost};
pub use saved::SavedState;

/// Configuration knobs for the engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Window in which layout notifications are coalesced into one pass.
    pub debounce: Duration,
    /// Delay before a node that never reached a surface is destroyed.
    pub orphan_grace: Duration,
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<LifecycleMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    pub audit: Arc<dyn LifecycleAudit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Self::debounce_for_display(60, Duration::from_millis(10)),
            orphan_grace: Duration::from_millis(100),
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "viewlife::metrics".to_string(),
            audit: Arc::new(NullLifecycleAudit),
        }
    }
}

impl EngineConfig {
    /// Defaults with the debounce window derived from the host display.
    pub fn for_display(refresh_hz: u32, frame_delay: Duration) -> Self {
        Self {
            debounce: Self::debounce_for_display(refresh_hz, frame_delay),
            ..Self::default()
        }
    }

    /// Two frames of the slower of the refresh interval and the frame delay.
    pub fn debounce_for_display(refresh_hz: u32, frame_delay: Duration) -> Duration {
        let refresh = Duration::from_millis(1000 / u64::from(refresh_hz.max(1)));
        refresh.max(frame_delay) * 2
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn LifecycleAudit>) -> Self {
        self.audit = audit;
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(LifecycleMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<LifecycleMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

struct RootBinding {
    host: Arc<dyn HostLifecycle>,
}

/// Owns the node tree and every dispatcher, navigator and companion record
/// attached to it. All mutation happens through `&mut self`, which gives the
/// single dispatch queue the model relies on.
pub struct Engine {
    config: EngineConfig,
    scene: Scene,
    factory: Arc<dyn NodeFactory>,
    roots: SecondaryMap<NodeId, RootBinding>,
    dispatchers: SecondaryMap<NodeId, ContainerDispatcher>,
    hierarchies: SecondaryMap<NodeId, HierarchyDispatcher>,
    navigators: SecondaryMap<NodeId, BackStack>,
    companions: CompanionStore,
    scheduler: Scheduler,
    transitions: Vec<Transition>,
    generated_keys: u64,
    last_saved: Option<blake3::Hash>,
    last_metrics_emit: Option<Duration>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            scene: Scene::new(),
            factory: Arc::new(FactoryRegistry::new()),
            roots: SecondaryMap::new(),
            dispatchers: SecondaryMap::new(),
            hierarchies: SecondaryMap::new(),
            navigators: SecondaryMap::new(),
            companions: CompanionStore::new(),
            scheduler: Scheduler::new(),
            transitions: Vec::new(),
            generated_keys: 0,
            last_saved: None,
            last_metrics_emit: None,
        }
    }

    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: NodeFactory + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Read-only view of the tree, usable as a [`Geometry`](crate::scene::Geometry).
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn companions(&self) -> &CompanionStore {
        &self.companions
    }

    // ---- tree ------------------------------------------------------------

    pub fn create_node(&mut self, spec: NodeSpec) -> NodeId {
        self.scene.insert(spec)
    }

    /// Build a detached node through the factory.
    pub fn instantiate(
        &mut self,
        type_name: &str,
        key: Option<&str>,
        args: Option<Value>,
    ) -> Result<NodeId> {
        let mut spec = {
            let ctx = FactoryContext {
                container: None,
                container_key: None,
                type_name,
                key: key.unwrap_or_default(),
                args: args.as_ref(),
            };
            self.factory.create(&ctx)?
        };
        spec.type_name = type_name.to_string();
        if let Some(key) = key {
            spec.key = Some(key.to_string());
        }
        if spec.args.is_none() {
            spec.args = args;
        }
        Ok(self.scene.insert(spec))
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.scene.children(parent).len();
        self.insert_child(parent, index, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.require(parent)?;
        self.require(child)?;
        if !self.scene.insert_child(parent, index, child) {
            return Err(LifecycleError::NotAContainer(self.label(parent)));
        }
        self.pump();
        Ok(())
    }

    /// Detach `child` from `parent`. Dispatching containers destroy what they
    /// lose; other parents leave the node to the caller.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.require(parent)?;
        let removed = self.scene.remove_child(parent, child);
        self.pump();
        Ok(removed)
    }

    pub fn remove_and_destroy(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        self.require(parent)?;
        let removed = self.scene.remove_child(parent, child);
        if removed {
            self.destroy_node(child);
        }
        self.pump();
        Ok(removed)
    }

    pub fn remove_and_destroy_all(&mut self, parent: NodeId) -> Result<usize> {
        self.require(parent)?;
        let children = self.scene.children(parent).to_vec();
        for child in children.iter().rev() {
            self.scene.remove_child(parent, *child);
            self.destroy_node(*child);
        }
        self.pump();
        Ok(children.len())
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) -> Result<()> {
        self.require(node)?;
        self.scene.set_rect(node, rect);
        self.pump();
        Ok(())
    }

    pub fn set_z(&mut self, node: NodeId, z: i32) -> Result<()> {
        self.require(node)?;
        self.scene.set_z(node, z);
        self.pump();
        Ok(())
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) -> Result<()> {
        self.require(node)?;
        self.scene.set_visible(node, visible);
        self.pump();
        Ok(())
    }

    /// Mark a top-level node as hosted by a live surface.
    pub fn attach_surface(&mut self, node: NodeId) -> Result<()> {
        self.require(node)?;
        self.scene.set_surface(node, true);
        self.pump();
        Ok(())
    }

    pub fn detach_surface(&mut self, node: NodeId) -> Result<()> {
        self.require(node)?;
        self.scene.set_surface(node, false);
        self.pump();
        Ok(())
    }

    /// Destroy `node` and everything below it. Destroying a node that is
    /// already gone does nothing.
    pub fn destroy(&mut self, node: NodeId) {
        self.destroy_node(node);
        self.pump();
    }

    // ---- inspection --------------------------------------------------------

    pub fn contains(&self, node: NodeId) -> bool {
        self.scene.contains(node)
    }

    pub fn node_count(&self) -> usize {
        self.scene.len()
    }

    pub fn state(&self, node: NodeId) -> Option<LifecycleState> {
        self.scene.state(node).map(|state| state.current)
    }

    pub fn node_state(&self, node: NodeId) -> Option<NodeState> {
        self.scene.state(node)
    }

    pub fn level(&self, node: NodeId) -> Option<usize> {
        self.scene.state(node).map(|state| state.level)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.scene.children(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.scene.parent(node)
    }

    pub fn type_name(&self, node: NodeId) -> Option<&str> {
        self.scene.type_name(node)
    }

    pub fn key(&self, node: NodeId) -> Option<&str> {
        self.scene.key(node)
    }

    pub fn is_displayed(&self, node: NodeId) -> bool {
        self.scene.is_displayed(node)
    }

    pub fn args(&self, node: NodeId) -> Option<&Value> {
        self.scene.node(node).and_then(|node| node.args.as_ref())
    }

    /// Per-instance state carried into back-stack entries and saved state.
    pub fn transient(&self, node: NodeId) -> Option<&Bundle> {
        self.scene.node(node).map(|node| &node.transient)
    }

    pub fn transient_mut(&mut self, node: NodeId) -> Option<&mut Bundle> {
        self.scene.node_mut(node).map(|node| &mut node.transient)
    }

    pub fn is_dispatching(&self, container: NodeId) -> bool {
        self.dispatchers.contains_key(container)
    }

    pub fn hierarchy_members(&self, root: NodeId) -> &[NodeId] {
        self.hierarchies
            .get(root)
            .map(|hierarchy| hierarchy.members())
            .unwrap_or(&[])
    }

    pub fn hierarchy_level(&self, container: NodeId) -> Option<usize> {
        self.scene.state(container).map(|state| state.hierarchy_level)
    }

    /// Drain the ordered log of applied transitions.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    pub fn observe<O>(&mut self, node: NodeId, observer: O) -> Result<()>
    where
        O: LifecycleObserver + 'static,
    {
        let entry = self
            .scene
            .node_mut(node)
            .ok_or(LifecycleError::NodeNotFound)?;
        entry.observers.push(Box::new(observer));
        Ok(())
    }

    // ---- roots -----------------------------------------------------------

    /// Bind a top-level node to the host that drives its lifecycle.
    pub fn bind_root(&mut self, node: NodeId, host: Arc<dyn HostLifecycle>) -> Result<()> {
        self.require(node)?;
        if self.roots.contains_key(node) {
            return Err(LifecycleError::AlreadyBound(self.label(node)));
        }
        if self
            .scene
            .ancestors(node)
            .into_iter()
            .any(|ancestor| self.dispatchers.contains_key(ancestor))
        {
            return Err(LifecycleError::NotARoot(self.label(node)));
        }
        let state = host.current_state();
        if state == LifecycleState::Destroyed {
            return Err(LifecycleError::HostDestroyed(host.name().to_string()));
        }

        let host_name = host.name().to_string();
        self.roots.insert(node, RootBinding { host });
        let mut hierarchy = HierarchyDispatcher::new(node);
        for member in self.scene.subtree(node) {
            if let Some(dispatcher) = self.dispatchers.get_mut(member) {
                if dispatcher.root().is_none() {
                    dispatcher.set_root(Some(node));
                    hierarchy.join(member);
                }
            }
        }
        self.hierarchies.insert(node, hierarchy);

        self.audit(
            LifecycleAuditStage::RootBound,
            [("root", json!(self.label(node))), ("host", json!(host_name))],
        );
        self.log(
            LogLevel::Info,
            ENGINE_TARGET,
            "root_bound",
            [
                json_kv("root", self.label(node)),
                json_kv("host", host_name),
                json_kv("state", state.as_str()),
            ],
        );

        self.request_state(node, state);
        self.dispatch_hierarchy(node);
        self.pump();
        Ok(())
    }

    /// Re-read the host state for `root` and propagate it.
    pub fn host_changed(&mut self, root: NodeId) -> Result<()> {
        let host = match self.roots.get(root) {
            Some(binding) => Arc::clone(&binding.host),
            None => {
                let label = if self.scene.contains(root) {
                    self.label(root)
                } else {
                    "<gone>".to_string()
                };
                return Err(LifecycleError::MissingHost(label));
            }
        };
        match host.current_state() {
            LifecycleState::Destroyed => self.destroy_node(root),
            state => self.request_state(root, state),
        }
        self.pump();
        self.maybe_emit_metrics();
        Ok(())
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.roots.contains_key(node)
    }

    // ---- dispatchers -----------------------------------------------------

    /// Start computing occlusion levels for `container`'s children.
    pub fn attach_dispatcher(&mut self, container: NodeId) -> Result<()> {
        self.require(container)?;
        if self.dispatchers.contains_key(container) {
            return Ok(());
        }

        let root = self.find_root(container);
        self.dispatchers
            .insert(container, ContainerDispatcher::new(container, root));
        if let Some(root) = root {
            let activated = self
                .hierarchies
                .get_mut(root)
                .is_some_and(|hierarchy| hierarchy.join(container));
            if activated {
                self.log(
                    LogLevel::Debug,
                    logging::HIERARCHY_TARGET,
                    "hierarchy_attached",
                    [json_kv("root", self.label(root))],
                );
            }
        }

        self.audit(
            LifecycleAuditStage::DispatcherAttached,
            [("container", json!(self.label(container)))],
        );
        self.dispatch_layout(container);
        if let Some(root) = root {
            self.dispatch_hierarchy(root);
        }
        self.pump();
        Ok(())
    }

    /// Stop dispatching. Children are not destroyed; they fall back to
    /// following the container's own state.
    pub fn detach_dispatcher(&mut self, container: NodeId) -> Result<()> {
        self.require(container)?;
        if !self.release_dispatcher(container) {
            return Ok(());
        }

        let ambient = self.scene.state(container).map(|state| state.current);
        for child in self.scene.children(container).to_vec() {
            if let Some(node) = self.scene.node_mut(child) {
                node.state.level = 0;
            }
            if let Some(ambient) = ambient {
                self.request_state(child, ambient);
            }
        }
        self.pump();
        Ok(())
    }

    // ---- companions --------------------------------------------------------

    /// Companion record for a keyed node that has been created.
    pub fn companion(&mut self, node: NodeId) -> Result<&mut CompanionRecord> {
        let entry = self.scene.node(node).ok_or(LifecycleError::NodeNotFound)?;
        let key = entry
            .key
            .clone()
            .ok_or_else(|| LifecycleError::MissingIdentity(entry.type_name.clone()))?;
        if !entry.state.current.is_at_least(LifecycleState::Created) {
            return Err(LifecycleError::NotCreated(self.label(node)));
        }
        let key = CompanionKey::new(entry.type_name.clone(), key);
        Ok(self.companions.get_or_create(&key))
    }

    pub fn retained(&mut self, node: NodeId) -> Result<RetainedScope> {
        Ok(self.companion(node)?.retained().clone())
    }

    // ---- time --------------------------------------------------------------

    /// Advance virtual time, running every deferred task that came due.
    pub fn tick(&mut self, elapsed: Duration) {
        for task in self.scheduler.advance(elapsed) {
            self.run_task(task);
            self.pump();
        }
        self.maybe_emit_metrics();
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.scheduler.is_empty() || self.scene.has_pending_events()
    }

    pub fn metrics_snapshot(&self) -> Option<MetricSnapshot> {
        let metrics = self.config.metrics.as_ref()?;
        let guard = metrics.lock().ok()?;
        Some(guard.snapshot(self.scheduler.now()))
    }

    // ---- helpers -----------------------------------------------------------

    fn require(&self, node: NodeId) -> Result<()> {
        if self.scene.contains(node) {
            Ok(())
        } else {
            Err(LifecycleError::NodeNotFound)
        }
    }

    fn find_root(&self, container: NodeId) -> Option<NodeId> {
        std::iter::once(container)
            .chain(self.scene.ancestors(container))
            .find(|node| self.roots.contains_key(*node))
    }

    pub(crate) fn label(&self, node: NodeId) -> String {
        match (self.scene.type_name(node), self.scene.key(node)) {
            (Some(type_name), Some(key)) => format!("{type_name}({key})"),
            (Some(type_name), None) => type_name.to_string(),
            _ => "<gone>".to_string(),
        }
    }

    pub(crate) fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        logging::emit(self.config.logger.as_ref(), level, target, message, fields);
    }

    pub(crate) fn audit<'k, I>(&self, stage: LifecycleAuditStage, details: I)
    where
        I: IntoIterator<Item = (&'k str, Value)>,
    {
        let mut builder = LifecycleAuditEventBuilder::new(stage);
        for (key, value) in details {
            builder.detail(key, value);
        }
        self.config.audit.record(builder.finish());
    }

    pub(crate) fn with_metrics(&self, record: impl FnOnce(&mut LifecycleMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut guard);
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics.is_none() || self.config.metrics_interval.is_zero() {
            return;
        }

        let now = self.scheduler.now();
        match self.last_metrics_emit {
            Some(last) if now.saturating_sub(last) < self.config.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }

        if let (Some(logger), Some(snapshot)) = (self.config.logger.as_ref(), self.metrics_snapshot())
        {
            let event = snapshot.to_log_event(&self.config.metrics_target);
            let _ = logger.log_event(event);
        }
    }
}
