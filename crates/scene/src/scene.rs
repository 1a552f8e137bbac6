use marionette_common::{EventBus, NodeId, RenderContext};
use marionette_entity::{ControllerState, EntityController, EntityError, EntityRegistry, Phase};
use marionette_graph::SceneGraph;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

use crate::report::{BehaviorFault, FrameReport};

/// Errors from scene lifecycle calls.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene is not initialized; call init before update")]
    NotInitialized,
    #[error("scene is already initialized")]
    AlreadyInitialized,
    #[error("scene root {0:?} is not in the scene graph")]
    MissingRoot(NodeId),
    #[error("initialization failed on node {node:?}")]
    InitFailed {
        node: NodeId,
        #[source]
        source: EntityError,
    },
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Catch panics raised by behavior `update` and report them as faults
    /// instead of unwinding through the frame.
    pub isolate_panics: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            isolate_panics: true,
        }
    }
}

/// Root of a behavior-driven node tree.
///
/// `init` walks the tree once and initializes every controller; `update`
/// walks the live tree each frame and updates them.
///
/// Both walks are pre-order: a node's behaviors run before any of its
/// children's, and siblings run left to right in graph order. Children are
/// read after the parent's behaviors ran, so nodes a parent spawns during
/// its own update are visited in the same pass.
#[derive(Debug)]
pub struct Scene {
    root: NodeId,
    registry: EntityRegistry,
    config: SceneConfig,
    initialized: bool,
    frame: u64,
    /// Traversal stack, kept between passes to avoid per-frame allocation.
    stack: Vec<NodeId>,
}

impl Scene {
    pub fn new(root: NodeId) -> Self {
        Self::with_config(root, SceneConfig::default())
    }

    pub fn with_config(root: NodeId, config: SceneConfig) -> Self {
        Self {
            root,
            registry: EntityRegistry::new(),
            config,
            initialized: false,
            frame: 0,
            stack: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of update passes run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Controller for `node`, created on first use.
    pub fn adapt(&mut self, node: NodeId) -> &mut EntityController {
        self.registry.adapt(node)
    }

    pub fn detach(&mut self, node: NodeId, events: &mut EventBus) -> bool {
        self.registry.detach(node, events)
    }

    pub fn prune(&mut self, graph: &dyn SceneGraph, events: &mut EventBus) -> Vec<NodeId> {
        self.registry.prune(graph, events)
    }

    /// Clear an init fault so the node is retried on the next pass.
    pub fn reset_fault(&mut self, node: NodeId) -> bool {
        self.registry
            .get_mut(node)
            .is_some_and(EntityController::reset_fault)
    }

    /// Initialize every controller reachable from the root.
    ///
    /// The first behavior that fails its `init` aborts the walk: its
    /// controller is left `Faulted`, the scene stays uninitialized and the
    /// error is returned. A later call resumes where it left off, since
    /// controllers that already initialized are skipped.
    pub fn init(
        &mut self,
        graph: &mut dyn SceneGraph,
        render: &RenderContext,
        events: &mut EventBus,
    ) -> Result<usize, SceneError> {
        let _span = tracing::info_span!("scene_init").entered();
        if self.initialized {
            tracing::error!("scene init called twice");
            return Err(SceneError::AlreadyInitialized);
        }
        if !graph.contains(self.root) {
            return Err(SceneError::MissingRoot(self.root));
        }

        let mut initialized = 0;
        self.stack.clear();
        self.stack.push(self.root);
        while let Some(id) = self.stack.pop() {
            if let Some(controller) = self.registry.get_mut(id) {
                match controller.state() {
                    ControllerState::Pending => {
                        controller
                            .init_pending(graph, render, events)
                            .map_err(|source| SceneError::InitFailed { node: id, source })?;
                        initialized += 1;
                    }
                    ControllerState::Faulted => {
                        tracing::warn!(node = %id.short(), "skipping faulted controller");
                    }
                    ControllerState::Initialized => {}
                }
            }
            self.stack.extend(graph.children(id).iter().rev());
        }

        self.initialized = true;
        tracing::info!(controllers = initialized, "scene initialized");
        Ok(initialized)
    }

    /// Run one update pass over the live tree.
    ///
    /// Controllers with behaviors added since their last init are caught up
    /// (init, then update) in the same pass. A failing behavior is reported
    /// in the returned [`FrameReport`] and only costs its own node the frame.
    pub fn update(
        &mut self,
        graph: &mut dyn SceneGraph,
        render: &RenderContext,
        events: &mut EventBus,
        dt: f64,
    ) -> Result<FrameReport, SceneError> {
        if !self.initialized {
            tracing::error!("scene update called before init");
            return Err(SceneError::NotInitialized);
        }
        if !graph.contains(self.root) {
            return Err(SceneError::MissingRoot(self.root));
        }

        self.frame += 1;
        let _span = tracing::trace_span!("scene_update", frame = self.frame).entered();
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        self.stack.clear();
        self.stack.push(self.root);
        while let Some(id) = self.stack.pop() {
            // A behavior earlier in this pass may have removed the node.
            if !graph.contains(id) {
                continue;
            }
            report.nodes_visited += 1;
            if let Some(controller) = self.registry.get_mut(id) {
                drive(
                    controller,
                    graph,
                    render,
                    events,
                    dt,
                    self.config.isolate_panics,
                    &mut report,
                );
            }
            self.stack.extend(graph.children(id).iter().rev());
        }

        if !report.is_clean() {
            tracing::debug!(
                frame = report.frame,
                faults = report.faults.len(),
                "frame finished with isolated faults"
            );
        }
        Ok(report)
    }
}

/// Catch up and update one controller, containing any failure to it.
fn drive(
    controller: &mut EntityController,
    graph: &mut dyn SceneGraph,
    render: &RenderContext,
    events: &mut EventBus,
    dt: f64,
    isolate_panics: bool,
    report: &mut FrameReport,
) {
    let node = controller.node();
    match controller.state() {
        ControllerState::Faulted => {
            report.skipped_faulted += 1;
            return;
        }
        ControllerState::Pending => {
            let result = if isolate_panics {
                match panic::catch_unwind(AssertUnwindSafe(|| {
                    controller.init_pending(graph, render, events)
                })) {
                    Ok(result) => result,
                    Err(payload) => {
                        controller.mark_faulted();
                        let fault = BehaviorFault::from_panic(node, Phase::Init, &*payload);
                        record(report, fault);
                        return;
                    }
                }
            } else {
                controller.init_pending(graph, render, events)
            };
            match result {
                Ok(count) => report.catch_up_inits += count,
                Err(err) => {
                    record(report, BehaviorFault::from_entity_error(node, &err));
                    return;
                }
            }
        }
        ControllerState::Initialized => {}
    }

    let result = if isolate_panics {
        match panic::catch_unwind(AssertUnwindSafe(|| {
            controller.update(graph, render, events, dt)
        })) {
            Ok(result) => result,
            Err(payload) => {
                record(report, BehaviorFault::from_panic(node, Phase::Update, &*payload));
                return;
            }
        }
    } else {
        controller.update(graph, render, events, dt)
    };

    match result {
        Ok(count) => {
            report.entities_updated += 1;
            report.behaviors_updated += count;
        }
        Err(err) => record(report, BehaviorFault::from_entity_error(node, &err)),
    }
}

fn record(report: &mut FrameReport, fault: BehaviorFault) {
    tracing::warn!(
        node = %fault.node.short(),
        kind = ?fault.kind,
        phase = %fault.phase,
        message = %fault.message,
        "behavior fault isolated"
    );
    report.faults.push(fault);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use marionette_common::Transform2D;
    use marionette_entity::{Behavior, BehaviorContext, BehaviorError, BehaviorKind, Phase};
    use marionette_graph::NodeTree;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every lifecycle call into a shared log.
    struct Tracer {
        name: &'static str,
        log: Log,
    }

    impl Tracer {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: log.clone(),
            }
        }
    }

    impl Behavior for Tracer {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named(self.name)
        }

        fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            self.log.borrow_mut().push(format!("init:{}", self.name));
            Ok(())
        }

        fn update(&mut self, _ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            self.log.borrow_mut().push(format!("update:{}", self.name));
            Ok(())
        }
    }

    /// Counts calls; fails its update on one chosen frame.
    #[derive(Default)]
    struct Counter {
        inits: Rc<Cell<u32>>,
        updates: Rc<Cell<u32>>,
        fail_on: Option<u32>,
        panic_on: Option<u32>,
        panic_in_init: bool,
    }

    impl Behavior for Counter {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named("counter")
        }

        fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            self.inits.set(self.inits.get() + 1);
            if self.panic_in_init {
                panic!("counter panicked in init");
            }
            Ok(())
        }

        fn update(&mut self, _ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            let frame = self.updates.get() + 1;
            if self.panic_on == Some(frame) {
                panic!("counter panicked on frame {frame}");
            }
            if self.fail_on == Some(frame) {
                self.updates.set(frame);
                return Err(BehaviorError::Failed(format!("failed on frame {frame}")));
            }
            self.updates.set(frame);
            Ok(())
        }
    }

    /// Fails `init` while the shared flag is set.
    struct Flaky {
        failing: Rc<Cell<bool>>,
        inits: Rc<Cell<u32>>,
    }

    impl Behavior for Flaky {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named("flaky")
        }

        fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            self.inits.set(self.inits.get() + 1);
            if self.failing.get() {
                return Err(BehaviorError::Failed("not ready".into()));
            }
            Ok(())
        }

        fn update(&mut self, _ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            Ok(())
        }
    }

    /// Moves its node right by one unit per frame.
    struct Drift;

    impl Behavior for Drift {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named("drift")
        }

        fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            Ok(())
        }

        fn update(&mut self, ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            let pos = ctx
                .graph
                .position(ctx.node)
                .ok_or(BehaviorError::MissingNode(ctx.node))?;
            ctx.graph.set_position(ctx.node, pos + Vec2::X);
            Ok(())
        }
    }

    /// Copies its parent's x position as seen during the update.
    struct ReadParent {
        seen: Rc<RefCell<Vec<f32>>>,
    }

    impl Behavior for ReadParent {
        fn kind(&self) -> BehaviorKind {
            BehaviorKind::Named("read-parent")
        }

        fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
            Ok(())
        }

        fn update(&mut self, ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
            let parent = ctx
                .graph
                .parent(ctx.node)
                .ok_or(BehaviorError::MissingNode(ctx.node))?;
            let x = ctx.graph.position(parent).map(|p| p.x).unwrap_or_default();
            self.seen.borrow_mut().push(x);
            Ok(())
        }
    }

    struct Fixture {
        tree: NodeTree,
        render: RenderContext,
        events: EventBus,
        scene: Scene,
    }

    impl Fixture {
        fn new() -> Self {
            let tree = NodeTree::new();
            let scene = Scene::new(tree.root());
            Self {
                tree,
                render: RenderContext::default(),
                events: EventBus::new(),
                scene,
            }
        }

        fn spawn(&mut self, parent: NodeId) -> NodeId {
            self.tree.spawn(parent, Transform2D::default()).unwrap()
        }

        fn init(&mut self) -> Result<usize, SceneError> {
            self.scene
                .init(&mut self.tree, &self.render, &mut self.events)
        }

        fn update(&mut self) -> FrameReport {
            self.scene
                .update(&mut self.tree, &self.render, &mut self.events, 1.0 / 60.0)
                .unwrap()
        }
    }

    #[test]
    fn update_before_init_is_rejected() {
        let mut f = Fixture::new();
        let log: Log = Rc::default();
        let root = f.tree.root();
        f.scene.adapt(root).add_behavior(Tracer::new("p", &log));

        let err = f
            .scene
            .update(&mut f.tree, &f.render, &mut f.events, 0.016)
            .unwrap_err();
        assert!(matches!(err, SceneError::NotInitialized));
        assert!(log.borrow().is_empty());
        assert_eq!(f.scene.frame(), 0);
    }

    #[test]
    fn init_twice_is_rejected() {
        let mut f = Fixture::new();
        f.init().unwrap();
        assert!(matches!(f.init(), Err(SceneError::AlreadyInitialized)));
    }

    #[test]
    fn attachment_order_is_preserved_every_frame() {
        let mut f = Fixture::new();
        let log: Log = Rc::default();
        let node = f.spawn(f.tree.root());
        f.scene
            .adapt(node)
            .add_behavior(Tracer::new("b1", &log))
            .add_behavior(Tracer::new("b2", &log))
            .add_behavior(Tracer::new("b3", &log));

        f.init().unwrap();
        for _ in 0..3 {
            f.update();
        }

        let mut expected = vec!["init:b1", "init:b2", "init:b3"];
        for _ in 0..3 {
            expected.extend(["update:b1", "update:b2", "update:b3"]);
        }
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn init_runs_once_across_many_frames() {
        let mut f = Fixture::new();
        let counter = Counter::default();
        let inits = counter.inits.clone();
        let updates = counter.updates.clone();
        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(counter);

        f.init().unwrap();
        for _ in 0..120 {
            f.update();
        }
        assert_eq!(inits.get(), 1);
        assert_eq!(updates.get(), 120);
    }

    #[test]
    fn late_behavior_is_caught_up_in_the_same_frame() {
        let mut f = Fixture::new();
        let log: Log = Rc::default();
        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(Tracer::new("early", &log));
        f.init().unwrap();
        f.update();
        log.borrow_mut().clear();

        f.scene.adapt(node).add_behavior(Tracer::new("late", &log));
        let report = f.update();
        assert_eq!(report.catch_up_inits, 1);
        assert_eq!(
            *log.borrow(),
            vec!["init:late", "update:early", "update:late"]
        );

        log.borrow_mut().clear();
        let report = f.update();
        assert_eq!(report.catch_up_inits, 0);
        assert_eq!(*log.borrow(), vec!["update:early", "update:late"]);
    }

    #[test]
    fn nodes_spawned_after_init_are_caught_up() {
        let mut f = Fixture::new();
        let log: Log = Rc::default();
        f.init().unwrap();

        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(Tracer::new("new", &log));
        f.update();
        f.update();
        assert_eq!(*log.borrow(), vec!["init:new", "update:new", "update:new"]);
    }

    #[test]
    fn traversal_is_preorder_left_to_right() {
        let mut f = Fixture::new();
        let log: Log = Rc::default();
        let root = f.tree.root();
        let a = f.spawn(root);
        let a1 = f.spawn(a);
        let a2 = f.spawn(a);
        let b = f.spawn(root);
        let b1 = f.spawn(b);
        // Adapt out of tree order; the walk must not care.
        for (node, name) in [(b1, "b1"), (a2, "a2"), (root, "root"), (b, "b"), (a1, "a1"), (a, "a")] {
            f.scene.adapt(node).add_behavior(Tracer::new(name, &log));
        }

        f.init().unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["init:root", "init:a", "init:a1", "init:a2", "init:b", "init:b1"]
        );

        log.borrow_mut().clear();
        let report = f.update();
        assert_eq!(report.nodes_visited, 6);
        assert_eq!(
            *log.borrow(),
            vec!["update:root", "update:a", "update:a1", "update:a2", "update:b", "update:b1"]
        );
    }

    #[test]
    fn children_see_parent_changes_from_the_same_frame() {
        let mut f = Fixture::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let parent = f.spawn(f.tree.root());
        let child = f.spawn(parent);
        f.scene.adapt(parent).add_behavior(Drift);
        f.scene
            .adapt(child)
            .add_behavior(ReadParent { seen: seen.clone() });

        f.init().unwrap();
        f.update();
        f.update();
        assert_eq!(*seen.borrow(), vec![1.0, 2.0]);
    }

    #[test]
    fn update_fault_is_isolated_to_its_node() {
        let mut f = Fixture::new();
        let a = f.spawn(f.tree.root());
        let b = f.spawn(f.tree.root());
        let a_counter = Counter {
            fail_on: Some(3),
            ..Counter::default()
        };
        let b_counter = Counter::default();
        let b_updates = b_counter.updates.clone();
        f.scene.adapt(a).add_behavior(a_counter);
        f.scene.adapt(b).add_behavior(b_counter);

        f.init().unwrap();
        f.update();
        f.update();
        let report = f.update();

        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].node, a);
        assert_eq!(report.faults[0].phase, Phase::Update);
        assert_eq!(report.faults[0].kind, Some(BehaviorKind::Named("counter")));
        assert_eq!(b_updates.get(), 3);
        assert_eq!(report.entities_updated, 1);

        // A keeps running on later frames.
        let report = f.update();
        assert!(report.is_clean());
        assert_eq!(report.entities_updated, 2);
    }

    #[test]
    fn panicking_behavior_is_isolated() {
        let mut f = Fixture::new();
        let a = f.spawn(f.tree.root());
        let b = f.spawn(f.tree.root());
        f.scene.adapt(a).add_behavior(Counter {
            panic_on: Some(1),
            ..Counter::default()
        });
        let b_counter = Counter::default();
        let b_updates = b_counter.updates.clone();
        f.scene.adapt(b).add_behavior(b_counter);

        f.init().unwrap();
        let report = f.update();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].node, a);
        assert!(report.faults[0].message.contains("panicked"));
        assert_eq!(b_updates.get(), 1);
    }

    #[test]
    fn panicking_catch_up_init_is_isolated() {
        let mut f = Fixture::new();
        let a = f.spawn(f.tree.root());
        let b = f.spawn(f.tree.root());
        let b_counter = Counter::default();
        let b_updates = b_counter.updates.clone();
        f.scene.adapt(b).add_behavior(b_counter);
        f.init().unwrap();

        f.scene.adapt(a).add_behavior(Counter {
            panic_in_init: true,
            ..Counter::default()
        });
        let report = f.update();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].node, a);
        assert_eq!(report.faults[0].phase, Phase::Init);
        assert!(report.faults[0].message.contains("panicked in init"));
        assert_eq!(b_updates.get(), 1);
        assert_eq!(
            f.scene.registry().get(a).map(|c| c.state()),
            Some(ControllerState::Faulted)
        );

        // The faulted node is skipped from now on instead of panicking again.
        let report = f.update();
        assert!(report.is_clean());
        assert_eq!(report.skipped_faulted, 1);
        assert_eq!(b_updates.get(), 2);
    }

    #[test]
    fn init_fault_propagates_and_can_be_retried() {
        let mut f = Fixture::new();
        let failing = Rc::new(Cell::new(true));
        let flaky_inits = Rc::new(Cell::new(0));
        let steady = Counter::default();
        let steady_inits = steady.inits.clone();
        let steady_updates = steady.updates.clone();

        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(steady).add_behavior(Flaky {
            failing: failing.clone(),
            inits: flaky_inits.clone(),
        });

        let err = f.init().unwrap_err();
        assert!(matches!(err, SceneError::InitFailed { node: n, .. } if n == node));
        assert!(!f.scene.is_initialized());
        assert_eq!(
            f.scene.registry().get(node).map(|c| c.state()),
            Some(ControllerState::Faulted)
        );

        failing.set(false);
        assert!(f.scene.reset_fault(node));
        f.init().unwrap();
        f.update();

        assert_eq!(steady_inits.get(), 1);
        assert_eq!(flaky_inits.get(), 2);
        assert_eq!(steady_updates.get(), 1);
    }

    #[test]
    fn faulted_controllers_are_skipped_by_update() {
        let mut f = Fixture::new();
        f.init().unwrap();

        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(Flaky {
            failing: Rc::new(Cell::new(true)),
            inits: Rc::new(Cell::new(0)),
        });

        // Catch-up init fails: reported, not propagated.
        let report = f.update();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].phase, Phase::Init);

        let report = f.update();
        assert!(report.is_clean());
        assert_eq!(report.skipped_faulted, 1);
    }

    #[test]
    fn removed_nodes_are_not_visited() {
        let mut f = Fixture::new();
        let counter = Counter::default();
        let updates = counter.updates.clone();
        let node = f.spawn(f.tree.root());
        f.scene.adapt(node).add_behavior(counter);
        f.init().unwrap();
        f.update();

        f.tree.remove(node).unwrap();
        f.update();
        assert_eq!(updates.get(), 1);
        assert!(f.scene.registry().contains(node));

        let pruned = f.scene.prune(&f.tree, &mut f.events);
        assert_eq!(pruned, vec![node]);
        assert!(f.scene.registry().is_empty());
    }

    #[test]
    fn identical_scenes_stay_in_lockstep() {
        let run = || {
            let mut f = Fixture::new();
            let mover = f.spawn(f.tree.root());
            let child = f.spawn(mover);
            f.scene.adapt(mover).add_behavior(Drift);
            f.scene.adapt(child).add_behavior(Drift);
            f.init().unwrap();
            for _ in 0..30 {
                f.update();
            }
            f.tree.state_hash()
        };
        assert_eq!(run(), run());
    }
}
