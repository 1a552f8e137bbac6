use glam::Vec2;
use marionette_common::{NodeId, Tiling};
use marionette_entity::{Behavior, BehaviorContext, BehaviorError, BehaviorKind, KindedBehavior};
use marionette_graph::SceneGraph;

/// One tiling layer and the fraction of camera motion it tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParallaxLayer {
    pub node: NodeId,
    /// 0 = pinned to the screen, 1 = moves with the world.
    pub scroll_scale: Vec2,
}

/// Scrolls tiling layers by a fraction of the camera's motion.
///
/// Each update the camera's displacement since the previous update is
/// scaled per layer and added to that layer's tiling offset. Offsets are
/// kept in `[0, tile_size)` so they never grow with session length.
#[derive(Debug)]
pub struct ParallaxBackground {
    camera: NodeId,
    layers: Vec<ParallaxLayer>,
    last_camera: Option<Vec2>,
}

impl ParallaxBackground {
    pub fn new(camera: NodeId) -> Self {
        Self {
            camera,
            layers: Vec::new(),
            last_camera: None,
        }
    }

    pub fn with_layer(mut self, node: NodeId, scroll_scale: Vec2) -> Self {
        self.add_layer(node, scroll_scale);
        self
    }

    /// Layers added after init are checked on the next update that scrolls.
    pub fn add_layer(&mut self, node: NodeId, scroll_scale: Vec2) -> &mut Self {
        self.layers.push(ParallaxLayer { node, scroll_scale });
        self
    }

    pub fn layers(&self) -> &[ParallaxLayer] {
        &self.layers
    }

    pub fn camera(&self) -> NodeId {
        self.camera
    }
}

/// Float modulo into `[0, size)` per axis.
pub fn wrap_offset(offset: Vec2, size: Vec2) -> Vec2 {
    Vec2::new(wrap_axis(offset.x, size.x), wrap_axis(offset.y, size.y))
}

/// Tiling of a layer node, rejecting nodes that cannot be wrapped.
fn layer_tiling(graph: &dyn SceneGraph, layer: &ParallaxLayer) -> Result<Tiling, BehaviorError> {
    let tiling = graph
        .tiling(layer.node)
        .ok_or_else(|| BehaviorError::Invalid(format!("layer {:?} has no tiling", layer.node)))?;
    let size = tiling.tile_size;
    if !(size.is_finite() && size.x > 0.0 && size.y > 0.0) {
        return Err(BehaviorError::Invalid(format!(
            "layer {:?} has non-positive tile size {size}",
            layer.node
        )));
    }
    Ok(tiling)
}

fn wrap_axis(v: f32, size: f32) -> f32 {
    let r = v.rem_euclid(size);
    // rem_euclid rounds tiny negatives up to exactly `size`.
    if r >= size { 0.0 } else { r }
}

impl Behavior for ParallaxBackground {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn init(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let camera = ctx
            .graph
            .position(self.camera)
            .ok_or(BehaviorError::MissingNode(self.camera))?;
        for layer in &self.layers {
            layer_tiling(&*ctx.graph, layer)?;
        }
        self.last_camera = Some(camera);
        tracing::debug!(layers = self.layers.len(), "parallax initialized");
        Ok(())
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
        let camera = ctx
            .graph
            .position(self.camera)
            .ok_or(BehaviorError::MissingNode(self.camera))?;
        let delta = camera - self.last_camera.unwrap_or(camera);
        self.last_camera = Some(camera);
        if delta == Vec2::ZERO {
            return Ok(());
        }

        for layer in &self.layers {
            let tiling = layer_tiling(&*ctx.graph, layer)?;
            let offset = wrap_offset(tiling.offset + delta * layer.scroll_scale, tiling.tile_size);
            ctx.graph.set_tiling_offset(layer.node, offset);
        }
        Ok(())
    }
}

impl KindedBehavior for ParallaxBackground {
    const KIND: BehaviorKind = BehaviorKind::Parallax;
}
