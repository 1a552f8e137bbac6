use glam::Vec2;
use marionette_behaviors::{CameraFollow, ParallaxBackground};
use marionette_common::{NodeId, Rect, Transform2D};
use marionette_engine::{DeltaUnit, EngineConfig};
use marionette_entity::{Behavior, BehaviorContext, BehaviorError, BehaviorKind};
use marionette_graph::{GraphError, NodeTree, SceneGraph};
use marionette_scene::Scene;

/// Moves its node at a constant velocity, in units per second.
pub struct Walker {
    pub velocity: Vec2,
}

impl Behavior for Walker {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Named("walker")
    }

    fn init(&mut self, _ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>, dt: f64) -> Result<(), BehaviorError> {
        let pos = ctx
            .graph
            .position(ctx.node)
            .ok_or(BehaviorError::MissingNode(ctx.node))?;
        ctx.graph.set_position(ctx.node, pos + self.velocity * dt as f32);
        Ok(())
    }
}

/// The demo scenario: a walking player, a camera chasing it, and a
/// two-layer parallax background reading the camera.
pub struct DemoScene {
    pub tree: NodeTree,
    pub scene: Scene,
    pub player: NodeId,
    pub camera: NodeId,
    pub layers: [NodeId; 2],
}

impl DemoScene {
    pub fn build(speed: f32, config: &EngineConfig) -> Result<Self, GraphError> {
        let mut tree = NodeTree::new();
        let root = tree.root();
        tree.set_label(root, "root");

        let player = tree.spawn(root, Transform2D::default())?;
        tree.set_label(player, "player");
        let camera = tree.spawn(root, Transform2D::default())?;
        tree.set_label(camera, "camera");
        let background = tree.spawn(root, Transform2D::default())?;
        tree.set_label(background, "background");
        let far = tree.spawn_tiling(background, Transform2D::default(), Vec2::splat(512.0))?;
        tree.set_label(far, "far");
        let near = tree.spawn_tiling(background, Transform2D::default(), Vec2::splat(256.0))?;
        tree.set_label(near, "near");

        let mut scene = Scene::with_config(root, config.scene.clone());
        scene.adapt(player).add_behavior(Walker {
            velocity: Vec2::new(240.0, 30.0),
        });
        scene.adapt(camera).add_behavior(
            CameraFollow::new(Some(player), speed)
                .with_offset(Vec2::new(0.0, -40.0))
                .with_bounds(Rect::new(Vec2::splat(-4096.0), Vec2::splat(4096.0))),
        );
        scene.adapt(background).add_behavior(
            ParallaxBackground::new(camera)
                .with_layer(far, Vec2::splat(0.2))
                .with_layer(near, Vec2::splat(0.6)),
        );

        Ok(Self {
            tree,
            scene,
            player,
            camera,
            layers: [far, near],
        })
    }
}

/// Raw delta for one 60 Hz frame in the configured unit.
pub fn frame_delta(unit: DeltaUnit) -> f64 {
    match unit {
        DeltaUnit::Seconds => 1.0 / 60.0,
        DeltaUnit::Milliseconds => 1000.0 / 60.0,
        DeltaUnit::Frames { rate } => rate / 60.0,
    }
}
