use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::lifecycle::LifecycleEvent;
use crate::logging::MemorySink;
use crate::navigation::{NavigationOutcome, Navigator, NavigatorHandle};

const DEBOUNCE: Duration = Duration::from_millis(32);

fn full() -> Rect {
    Rect::new(0, 0, 100, 100)
}

fn screen(ctx: &FactoryContext<'_>) -> NodeSpec {
    NodeSpec::new(ctx.type_name).with_rect(full())
}

fn factory() -> FactoryRegistry {
    FactoryRegistry::new()
        .with("A", screen)
        .with("B", screen)
        .with("C", screen)
        .with("D", screen)
}

#[derive(Clone, Default)]
struct Recorder {
    events: Rc<RefCell<Vec<LifecycleEvent>>>,
}

impl Recorder {
    fn events(&self) -> Vec<LifecycleEvent> {
        self.events.borrow().clone()
    }

    fn count(&self, event: LifecycleEvent) -> usize {
        self.events().into_iter().filter(|e| *e == event).count()
    }
}

impl LifecycleObserver for Recorder {
    fn on_event(&mut self, event: LifecycleEvent) {
        self.events.borrow_mut().push(event);
    }
}

struct Fixture {
    engine: Engine,
    host: Arc<SharedHost>,
    root: NodeId,
    stack: NodeId,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let mut fixture = Self::bare(config);
        fixture
            .engine
            .attach_navigation(fixture.stack, None)
            .unwrap();
        fixture
    }

    /// Bound root with an unattached `Stack(main)` container under it.
    fn bare(config: EngineConfig) -> Self {
        let mut engine = Engine::new(config).with_factory(factory());
        let root = engine.create_node(NodeSpec::new("Window").with_key("window").with_rect(full()));
        engine.attach_surface(root).unwrap();
        let host = Arc::new(SharedHost::new("activity", LifecycleState::Resumed));
        engine.bind_root(root, host.clone()).unwrap();
        let stack = engine.create_node(NodeSpec::new("Stack").with_key("main").with_rect(full()));
        engine.add_child(root, stack).unwrap();
        Self {
            engine,
            host,
            root,
            stack,
        }
    }

    fn screen(&mut self, type_name: &str) -> NodeId {
        self.engine
            .create_node(NodeSpec::new(type_name).with_rect(full()))
    }

    fn forward(&mut self, type_name: &str) -> NodeId {
        let node = self.screen(type_name);
        self.nav().forward(node).unwrap();
        node
    }

    fn add(&mut self, type_name: &str) -> NodeId {
        let node = self.screen(type_name);
        self.nav().add(node).unwrap();
        node
    }

    fn nav(&mut self) -> NavigatorHandle<'_> {
        self.engine.navigator(self.stack).unwrap()
    }

    fn top(&self) -> NodeId {
        *self.engine.children(self.stack).last().unwrap()
    }

    fn top_type(&self) -> String {
        self.engine.type_name(self.top()).unwrap().to_string()
    }

    fn depth(&mut self) -> usize {
        self.nav().depth()
    }

    fn companion_key(&self, node: NodeId) -> CompanionKey {
        CompanionKey::new(
            self.engine.type_name(node).unwrap(),
            self.engine.key(node).unwrap(),
        )
    }
}

#[test]
fn root_follows_host_state() {
    let mut f = Fixture::new();
    assert_eq!(f.engine.state(f.root), Some(LifecycleState::Resumed));
    assert_eq!(f.engine.state(f.stack), Some(LifecycleState::Resumed));
    f.engine.take_transitions();

    f.host.set_state(LifecycleState::Started);
    f.engine.host_changed(f.root).unwrap();

    assert_eq!(f.engine.state(f.root), Some(LifecycleState::Started));
    assert_eq!(f.engine.state(f.stack), Some(LifecycleState::Started));
    let transitions = f.engine.take_transitions();
    assert_eq!(
        transitions[0],
        Transition {
            node: f.root,
            from: LifecycleState::Resumed,
            to: LifecycleState::Started,
        }
    );
}

#[test]
fn host_destruction_tears_down_the_tree() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    f.host.set_state(LifecycleState::Destroyed);
    f.engine.host_changed(f.root).unwrap();

    assert!(!f.engine.contains(f.root));
    assert!(!f.engine.contains(f.stack));
    assert!(!f.engine.contains(a));
    assert_eq!(f.engine.node_count(), 0);
}

#[test]
fn binding_errors_fail_fast() {
    let mut f = Fixture::new();
    let a = f.forward("A");

    let stray = f.engine.create_node(NodeSpec::new("Stray"));
    assert!(matches!(
        f.engine.host_changed(stray),
        Err(LifecycleError::MissingHost(_))
    ));

    let dead = Arc::new(SharedHost::new("gone", LifecycleState::Destroyed));
    assert!(matches!(
        f.engine.bind_root(stray, dead),
        Err(LifecycleError::HostDestroyed(name)) if name == "gone"
    ));

    let host = Arc::new(SharedHost::new("again", LifecycleState::Resumed));
    assert!(matches!(
        f.engine.bind_root(f.root, host.clone()),
        Err(LifecycleError::AlreadyBound(_))
    ));
    assert!(matches!(
        f.engine.bind_root(a, host),
        Err(LifecycleError::NotARoot(_))
    ));
}

#[test]
fn covered_child_is_capped_until_revealed() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let b = f.add("B");

    assert_eq!(f.engine.state(b), Some(LifecycleState::Resumed));
    assert_eq!(f.engine.level(a), Some(1));
    assert_eq!(f.engine.state(a), Some(LifecycleState::Created));

    f.engine.set_rect(b, Rect::new(200, 0, 100, 100)).unwrap();
    assert_eq!(f.engine.state(a), Some(LifecycleState::Created));

    f.engine.tick(DEBOUNCE);
    assert_eq!(f.engine.level(a), Some(0));
    assert_eq!(f.engine.state(a), Some(LifecycleState::Resumed));
}

#[test]
fn layout_changes_are_debounced_and_coalesced() {
    let audit = Arc::new(RecordingAudit::new());
    let mut f = Fixture::with_config(EngineConfig::default().with_audit(audit.clone()));
    f.forward("A");
    let b = f.add("B");

    let passes = || {
        audit
            .stages()
            .into_iter()
            .filter(|stage| *stage == LifecycleAuditStage::LevelsComputed)
            .count()
    };
    let before = passes();

    for x in [10, 20, 30] {
        f.engine.set_rect(b, Rect::new(x, 0, 100, 100)).unwrap();
        f.engine.tick(Duration::from_millis(10));
    }
    assert_eq!(passes(), before);
    assert!(f.engine.has_pending_work());

    f.engine.tick(DEBOUNCE);
    assert_eq!(passes(), before + 1);
}

#[test]
fn recomputing_unchanged_geometry_emits_nothing() {
    let mut f = Fixture::new();
    f.forward("A");
    let b = f.add("B");
    f.engine.take_transitions();

    f.engine.set_rect(b, Rect::new(5, 5, 10, 10)).unwrap();
    f.engine.set_rect(b, full()).unwrap();
    f.engine.tick(DEBOUNCE);
    f.engine.tick(DEBOUNCE);

    assert!(f.engine.take_transitions().is_empty());
}

#[test]
fn hidden_nodes_never_start() {
    let mut f = Fixture::new();
    let badge = f
        .engine
        .create_node(NodeSpec::new("Badge").with_rect(full()).hidden());
    f.engine.add_child(f.root, badge).unwrap();
    assert_eq!(f.engine.state(badge), Some(LifecycleState::Created));

    f.engine.set_visible(badge, true).unwrap();
    assert_eq!(f.engine.state(badge), Some(LifecycleState::Resumed));

    f.engine.set_visible(badge, false).unwrap();
    assert_eq!(f.engine.state(badge), Some(LifecycleState::Created));
}

#[test]
fn observers_see_ordered_events() {
    let mut f = Fixture::new();
    let recorder = Recorder::default();
    let badge = f.engine.create_node(NodeSpec::new("Badge").with_rect(full()));
    f.engine.observe(badge, recorder.clone()).unwrap();
    f.engine.add_child(f.root, badge).unwrap();

    f.host.set_state(LifecycleState::Created);
    f.engine.host_changed(f.root).unwrap();
    f.engine.destroy(badge);

    assert_eq!(
        recorder.events(),
        vec![
            LifecycleEvent::OnCreate,
            LifecycleEvent::OnStart,
            LifecycleEvent::OnResume,
            LifecycleEvent::OnPause,
            LifecycleEvent::OnStop,
            LifecycleEvent::OnDestroy,
        ]
    );
}

#[test]
fn destroying_a_container_destroys_each_descendant_once() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let b = f.add("B");
    let inner = f.engine.create_node(NodeSpec::new("Inner"));
    f.engine.add_child(b, inner).unwrap();

    let recorders: Vec<_> = [f.stack, a, b, inner]
        .into_iter()
        .map(|node| {
            let recorder = Recorder::default();
            f.engine.observe(node, recorder.clone()).unwrap();
            recorder
        })
        .collect();
    f.engine.take_transitions();

    f.engine.destroy(f.stack);
    f.engine.destroy(f.stack);

    for (recorder, node) in recorders.iter().zip([f.stack, a, b, inner]) {
        assert_eq!(recorder.count(LifecycleEvent::OnDestroy), 1);
        assert!(!f.engine.contains(node));
    }
    let destroyed: Vec<_> = f
        .engine
        .take_transitions()
        .into_iter()
        .filter(|t| t.to == LifecycleState::Destroyed)
        .map(|t| t.node)
        .collect();
    assert_eq!(destroyed, vec![a, inner, b, f.stack]);
    assert!(f.engine.children(f.root).is_empty());
    assert!(f.engine.hierarchy_members(f.root).is_empty());
}

#[test]
fn forward_then_back_restores_previous() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let a_key = f.companion_key(a);
    let b = f.forward("B");

    assert!(!f.engine.contains(a));
    assert!(f.engine.companions().contains(&a_key));
    assert_eq!(f.depth(), 1);

    assert!(f.nav().back());
    assert!(!f.engine.contains(b));
    assert_eq!(f.top_type(), "A");
    assert_eq!(f.companion_key(f.top()), a_key);
    assert_eq!(f.engine.state(f.top()), Some(LifecycleState::Resumed));
    assert_eq!(f.depth(), 0);

    let restored = f.top();
    assert!(!f.nav().back());
    assert_eq!(f.engine.children(f.stack), &[restored]);
}

#[test]
fn back_without_entries_leaves_container_alone() {
    let mut f = Fixture::new();
    assert_eq!(f.nav().try_back(), NavigationOutcome::Empty);

    let a = f.forward("A");
    assert!(!f.nav().back());
    assert_eq!(f.engine.children(f.stack), &[a]);
    assert_eq!(f.engine.state(a), Some(LifecycleState::Resumed));
}

#[test]
fn back_including_pops_through_marker() {
    let mut f = Fixture::new();
    f.forward("A");
    let b = f.forward("B");
    let b_key = f.companion_key(b);
    let c = f.forward("C");

    assert!(!f.nav().back_including("Z"));
    assert!(!f.nav().back_including("A"));
    assert_eq!(f.depth(), 2);
    assert_eq!(f.top(), c);

    assert!(f.nav().back_including("B"));
    assert_eq!(f.top_type(), "A");
    assert_eq!(f.depth(), 0);
    assert!(!f.engine.companions().contains(&b_key));
    assert!(!f.engine.contains(c));
}

#[test]
fn back_to_keeps_marker() {
    let mut f = Fixture::new();
    f.forward("A");
    f.forward("B");
    let c = f.forward("C");
    let c_key = f.companion_key(c);
    f.forward("D");

    assert!(!f.nav().back_to("Z"));
    assert_eq!(f.depth(), 3);

    assert!(f.nav().back_to("B"));
    assert_eq!(f.top_type(), "B");
    assert_eq!(f.depth(), 1);
    assert!(!f.engine.companions().contains(&c_key));
}

#[test]
fn add_then_back_reveals_live_node() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let b = f.add("B");
    assert!(f.engine.node_state(a).unwrap().back_stack_item);

    assert_eq!(f.nav().try_back(), NavigationOutcome::Revealed(a));
    assert!(!f.engine.contains(b));
    assert!(!f.engine.node_state(a).unwrap().back_stack_item);
    assert_eq!(f.engine.state(a), Some(LifecycleState::Resumed));
}

#[test]
fn replace_swaps_top_without_touching_stack() {
    let mut f = Fixture::new();
    f.forward("A");
    let b = f.forward("B");
    let c = f.screen("C");

    f.nav().replace(c).unwrap();
    assert_eq!(f.engine.children(f.stack), &[c]);
    assert!(!f.engine.contains(b));
    assert_eq!(f.depth(), 1);

    assert!(f.nav().back());
    assert_eq!(f.top_type(), "A");
}

#[test]
fn replace_all_clears_everything() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let a_key = f.companion_key(a);
    let b = f.add("B");
    let c = f.screen("C");

    f.nav().replace_all(c).unwrap();
    assert_eq!(f.engine.children(f.stack), &[c]);
    assert_eq!(f.depth(), 0);
    assert!(!f.engine.contains(b));
    assert!(!f.engine.companions().contains(&a_key));
}

#[test]
fn retained_scope_survives_back_stack_and_drops_on_clear() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    let scope = f.engine.retained(a).unwrap();
    let model = scope.get_or_insert_with(|| 7u32).unwrap();

    f.forward("B");
    assert_eq!(scope.len(), 1);

    f.nav().back();
    let again = f.engine.retained(f.top()).unwrap().get::<u32>().unwrap();
    assert!(Arc::ptr_eq(&model, &again));

    let c = f.screen("C");
    f.nav().replace_all(c).unwrap();
    assert!(scope.is_empty());
}

#[test]
fn saved_state_round_trips_into_a_fresh_engine() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    f.engine
        .transient_mut(a)
        .unwrap()
        .put("scroll", &5u32)
        .unwrap();
    f.forward("B");
    f.add("C");

    let saved = f.engine.save_state().unwrap();
    let bundle = Bundle::from_json(&saved.bundle.to_json().unwrap()).unwrap();

    let mut g = Fixture::bare(EngineConfig::default());
    g.engine.attach_navigation(g.stack, Some(&bundle)).unwrap();

    let live: Vec<_> = g
        .engine
        .children(g.stack)
        .iter()
        .map(|node| g.engine.type_name(*node).unwrap().to_string())
        .collect();
    assert_eq!(live, vec!["B".to_string(), "C".to_string()]);
    let flags: Vec<_> = g
        .nav()
        .entries()
        .iter()
        .map(|entry| (entry.type_name().to_string(), entry.reusable))
        .collect();
    assert_eq!(flags, vec![("A".to_string(), true), ("B".to_string(), false)]);

    let revealed = g.nav().try_back();
    assert!(matches!(revealed, NavigationOutcome::Revealed(_)));
    assert_eq!(g.top_type(), "B");
    assert_eq!(g.engine.state(g.top()), Some(LifecycleState::Resumed));

    let restored = g.nav().try_back();
    let node = restored.node().unwrap();
    assert_eq!(g.engine.type_name(node), Some("A"));
    assert_eq!(
        g.engine.transient(node).unwrap().get::<u32>("scroll").unwrap(),
        Some(5)
    );
}

#[test]
fn unknown_types_restore_gracefully() {
    let sink = MemorySink::new();
    let mut f = Fixture::new();
    let legacy = f.screen("Legacy");
    f.nav().forward(legacy).unwrap();
    f.forward("A");
    let saved = f.engine.save_state().unwrap();

    let config = EngineConfig::default().with_logger(Logger::new(sink.clone()));
    let mut g = Fixture::bare(config);
    g.engine
        .attach_navigation(g.stack, Some(&saved.bundle))
        .unwrap();
    assert_eq!(g.depth(), 1);

    assert_eq!(
        g.nav().try_back(),
        NavigationOutcome::Unrestorable {
            type_name: "Legacy".to_string()
        }
    );
    assert!(g.engine.children(g.stack).is_empty());
    assert_eq!(g.depth(), 0);
    assert!(sink.messages().contains(&"restore_missed".to_string()));
}

#[test]
fn unresolvable_live_records_are_skipped() {
    let mut f = Fixture::new();
    f.forward("A");
    let legacy = f.screen("Legacy");
    f.nav().forward(legacy).unwrap();
    let saved = f.engine.save_state().unwrap();

    let mut g = Fixture::bare(EngineConfig::default());
    g.engine
        .attach_navigation(g.stack, Some(&saved.bundle))
        .unwrap();
    assert!(g.engine.children(g.stack).is_empty());
    assert_eq!(g.depth(), 1);
}

#[test]
fn missing_saved_state_means_empty_stack() {
    let mut g = Fixture::bare(EngineConfig::default());
    g.engine
        .attach_navigation(g.stack, Some(&Bundle::new()))
        .unwrap();
    assert_eq!(g.depth(), 0);
    assert!(g.engine.children(g.stack).is_empty());
}

#[test]
fn save_state_reports_changes() {
    let mut f = Fixture::new();
    f.forward("A");
    assert!(f.engine.save_state().unwrap().changed);
    assert!(!f.engine.save_state().unwrap().changed);
    f.forward("B");
    assert!(f.engine.save_state().unwrap().changed);
}

#[test]
fn orphans_are_destroyed_after_grace() {
    let mut f = Fixture::new();
    let side = f.engine.create_node(NodeSpec::new("Stack").with_key("side"));
    f.engine.attach_navigation(side, None).unwrap();

    let lost = f.screen("A");
    f.engine.navigator(side).unwrap().forward(lost).unwrap();
    f.engine.tick(Duration::from_millis(50));
    assert!(f.engine.contains(lost));
    f.engine.tick(Duration::from_millis(60));
    assert!(!f.engine.contains(lost));

    let kept = f.screen("B");
    f.engine.navigator(side).unwrap().forward(kept).unwrap();
    f.engine.attach_surface(side).unwrap();
    f.engine.tick(Duration::from_millis(200));
    assert!(f.engine.contains(kept));
}

#[test]
fn sibling_navigation_containers_rank_by_drawing_order() {
    let mut f = Fixture::new();
    let mut containers = Vec::new();
    for key in ["left", "right"] {
        let container = f
            .engine
            .create_node(NodeSpec::new("Stack").with_key(key).with_rect(full()));
        f.engine.add_child(f.root, container).unwrap();
        f.engine.attach_navigation(container, None).unwrap();
        containers.push(container);
    }
    let (left, right) = (containers[0], containers[1]);
    let left_screen = f.screen("A");
    f.engine.navigator(left).unwrap().forward(left_screen).unwrap();
    let right_screen = f.screen("B");
    f.engine.navigator(right).unwrap().forward(right_screen).unwrap();

    assert_eq!(f.engine.hierarchy_members(f.root).len(), 3);
    assert_eq!(f.engine.hierarchy_level(right), Some(0));
    assert_eq!(f.engine.hierarchy_level(left), Some(1));
    assert_eq!(f.engine.state(left), Some(LifecycleState::Created));
    assert_eq!(f.engine.state(left_screen), Some(LifecycleState::Created));
    assert_eq!(f.engine.state(right_screen), Some(LifecycleState::Resumed));

    f.engine.set_visible(right, false).unwrap();
    assert_eq!(f.engine.state(right_screen), Some(LifecycleState::Created));
    assert_eq!(f.engine.hierarchy_level(left), Some(0));
    assert_eq!(f.engine.state(left), Some(LifecycleState::Resumed));
    assert_eq!(f.engine.state(left_screen), Some(LifecycleState::Resumed));
}

#[test]
fn detaching_navigation_passes_state_through() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    f.add("B");
    assert_eq!(f.engine.state(a), Some(LifecycleState::Created));

    f.engine.detach_navigation(f.stack).unwrap();
    assert!(!f.engine.is_dispatching(f.stack));
    assert!(f.engine.hierarchy_members(f.root).is_empty());
    assert_eq!(f.engine.level(a), Some(0));
    assert_eq!(f.engine.state(a), Some(LifecycleState::Resumed));
    assert!(matches!(
        f.engine.navigator(f.stack),
        Err(LifecycleError::NavigationNotAttached(_))
    ));
}

#[test]
fn configuration_errors() {
    let mut f = Fixture::new();
    assert!(matches!(
        f.engine.attach_navigation(f.stack, None),
        Err(LifecycleError::DuplicateNavigation(_))
    ));

    let anonymous = f.engine.create_node(NodeSpec::new("Panel"));
    assert!(matches!(
        f.engine.attach_navigation(anonymous, None),
        Err(LifecycleError::MissingIdentity(name)) if name == "Panel"
    ));
    f.engine.add_child(f.root, anonymous).unwrap();
    assert!(matches!(
        f.engine.companion(anonymous),
        Err(LifecycleError::MissingIdentity(_))
    ));

    let pending = f.engine.create_node(NodeSpec::new("Panel").with_key("p"));
    assert!(matches!(
        f.engine.retained(pending),
        Err(LifecycleError::NotCreated(_))
    ));
    assert!(matches!(
        f.engine.instantiate("Nope", None, None),
        Err(LifecycleError::UnknownNodeType(name)) if name == "Nope"
    ));
}

#[test]
fn instantiate_builds_through_the_factory() {
    let mut f = Fixture::new();
    let node = f
        .engine
        .instantiate("A", Some("a-1"), Some(serde_json::json!({"id": 3})))
        .unwrap();
    assert_eq!(f.engine.key(node), Some("a-1"));
    f.nav().forward(node).unwrap();

    assert_eq!(f.engine.state(node), Some(LifecycleState::Resumed));
    let record = f.engine.companion(node).unwrap();
    assert_eq!(record.args, Some(serde_json::json!({"id": 3})));
}

#[test]
fn removal_helpers() {
    let mut f = Fixture::new();
    let first = f.engine.create_node(NodeSpec::new("Panel"));
    let second = f.engine.create_node(NodeSpec::new("Panel"));
    f.engine.add_child(f.root, first).unwrap();
    f.engine.add_child(f.root, second).unwrap();

    let loose = f.engine.create_node(NodeSpec::new("Panel"));
    f.engine.add_child(f.root, loose).unwrap();
    assert!(f.engine.remove_child(f.root, loose).unwrap());
    assert!(f.engine.contains(loose));
    assert_eq!(f.engine.state(loose), Some(LifecycleState::Created));

    assert!(f.engine.remove_and_destroy(f.root, first).unwrap());
    assert!(!f.engine.contains(first));

    assert_eq!(f.engine.remove_and_destroy_all(f.root).unwrap(), 2);
    assert!(!f.engine.contains(second));
    assert!(!f.engine.contains(f.stack));
    assert!(f.engine.children(f.root).is_empty());
}

#[test]
fn logging_and_metrics_follow_activity() {
    let sink = MemorySink::new();
    let mut config = EngineConfig::default().with_logger(Logger::new(sink.clone()));
    config.enable_metrics();
    config.metrics_interval = Duration::from_secs(1);
    let mut f = Fixture::with_config(config);
    f.forward("A");
    f.engine.tick(Duration::from_secs(1));

    let messages = sink.messages();
    for expected in ["root_bound", "levels_computed", "navigated", "lifecycle_metrics"] {
        assert!(
            messages.iter().any(|message| message == expected),
            "missing {expected}"
        );
    }
    let snapshot = f.engine.metrics_snapshot().unwrap();
    assert_eq!(snapshot.navigations, 1);
    assert!(snapshot.transitions > 0);
    assert!(snapshot.dispatch_passes > 0);
}

#[test]
fn debounce_derives_from_display() {
    assert_eq!(
        EngineConfig::debounce_for_display(60, Duration::from_millis(10)),
        Duration::from_millis(32)
    );
    assert_eq!(
        EngineConfig::debounce_for_display(120, Duration::from_millis(20)),
        Duration::from_millis(40)
    );
    assert_eq!(EngineConfig::default().debounce, DEBOUNCE);
}

#[test]
fn covered_child_moved_to_plain_parent_resumes() {
    let mut f = Fixture::new();
    let a = f.forward("A");
    f.add("B");
    assert_eq!(f.engine.level(a), Some(1));
    assert_eq!(f.engine.state(a), Some(LifecycleState::Created));

    let panel = f.engine.create_node(NodeSpec::new("Panel").with_rect(full()));
    f.engine.add_child(f.root, panel).unwrap();
    f.engine.add_child(panel, a).unwrap();
    f.engine.tick(Duration::from_secs(1));

    assert!(f.engine.contains(a));
    assert_eq!(f.engine.parent(a), Some(panel));
    assert_eq!(f.engine.level(a), Some(0));
    assert_eq!(f.engine.state(a), Some(LifecycleState::Resumed));
}

#[test]
fn navigation_destroys_what_it_pops_without_a_dispatcher() {
    let mut f = Fixture::new();
    f.forward("A");
    let b = f.forward("B");
    let b_key = f.companion_key(b);
    let recorder = Recorder::default();
    f.engine.observe(b, recorder.clone()).unwrap();

    f.engine.detach_dispatcher(f.stack).unwrap();
    assert!(f.nav().back());
    f.engine.tick(Duration::from_secs(1));

    assert!(!f.engine.contains(b));
    assert_eq!(recorder.count(LifecycleEvent::OnDestroy), 1);
    assert!(!f.engine.companions().contains(&b_key));
    assert_eq!(f.top_type(), "A");
    assert_eq!(f.engine.state(f.top()), Some(LifecycleState::Resumed));

    let restored = f.top();
    let c = f.screen("C");
    f.nav().replace(c).unwrap();
    assert!(!f.engine.contains(restored));
    assert_eq!(f.engine.children(f.stack), &[c]);
}

#[test]
fn revealed_entries_match_type_and_key() {
    let mut f = Fixture::new();
    let shared = |type_name: &str| NodeSpec::new(type_name).with_key("shared").with_rect(full());
    let a = f.engine.create_node(shared("A"));
    f.nav().forward(a).unwrap();
    let c = f.engine.create_node(shared("C"));
    f.nav().add(c).unwrap();
    f.add("D");

    assert_eq!(f.nav().try_back(), NavigationOutcome::Revealed(c));
    assert_eq!(f.nav().try_back(), NavigationOutcome::Revealed(a));
    assert_eq!(f.engine.children(f.stack), &[a]);
}

#[test]
fn restore_keeps_only_companions_of_the_attached_container() {
    let mut f = Fixture::new();
    let side = f
        .engine
        .create_node(NodeSpec::new("Stack").with_key("side").with_rect(full()));
    f.engine.add_child(f.root, side).unwrap();
    f.engine.attach_navigation(side, None).unwrap();
    let elsewhere = f.screen("A");
    f.engine.navigator(side).unwrap().forward(elsewhere).unwrap();
    let elsewhere_key = f.companion_key(elsewhere);

    let a = f.forward("A");
    let a_key = f.companion_key(a);
    f.forward("B");
    let saved = f.engine.save_state().unwrap();

    let mut g = Fixture::bare(EngineConfig::default());
    g.engine
        .attach_navigation(g.stack, Some(&saved.bundle))
        .unwrap();
    assert!(g.engine.companions().contains(&a_key));
    assert!(!g.engine.companions().contains(&elsewhere_key));
}
