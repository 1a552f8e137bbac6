use glam::Vec2;
use marionette_common::{EventBus, HostEvent, HostEventKind, ListenerHandle, NodeId, Rect};
use marionette_entity::{Behavior, BehaviorContext, BehaviorError, BehaviorKind, KindedBehavior};

/// Moves the camera node toward a target node with exponential smoothing.
///
/// Each update closes `speed` of the remaining distance, so with
/// `0 < speed < 1` the camera approaches the target monotonically and never
/// overshoots. The step is per update, not scaled by the frame delta. Zoom
/// (`desired_scale`) is applied as-is, without easing.
///
/// The camera node's position is the world point at the center of the view.
/// With `bounds` set, the goal is clamped so the visible area stays inside
/// them; the visible area is the viewport divided by the scale.
#[derive(Debug)]
pub struct CameraFollow {
    target: Option<NodeId>,
    speed: f32,
    pub desired_scale: Vec2,
    pub offset: Vec2,
    pub bounds: Option<Rect>,
    viewport: Vec2,
    resize: Option<ListenerHandle>,
}

impl CameraFollow {
    /// `speed` is clamped to `0..=1`.
    pub fn new(target: Option<NodeId>, speed: f32) -> Self {
        Self {
            target,
            speed: clamp_speed(speed),
            desired_scale: Vec2::ONE,
            offset: Vec2::ZERO,
            bounds: None,
            viewport: Vec2::ZERO,
            resize: None,
        }
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.desired_scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<NodeId>) {
        self.target = target;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = clamp_speed(speed);
    }

    /// Viewport size as last seen from the render context or a resize.
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Where the camera wants to be for a target at `target_pos`.
    pub fn goal(&self, target_pos: Vec2) -> Vec2 {
        let goal = target_pos + self.offset;
        let Some(bounds) = self.bounds else {
            return goal;
        };
        let scale = self.desired_scale.max(Vec2::splat(f32::EPSILON));
        let half_view = self.viewport / scale * 0.5;
        Vec2::new(
            clamp_axis(goal.x, bounds.min.x, bounds.max.x, half_view.x),
            clamp_axis(goal.y, bounds.min.y, bounds.max.y, half_view.y),
        )
    }
}

fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        0.0
    } else {
        speed.clamp(0.0, 1.0)
    }
}

/// Clamp a view center so `[v - half, v + half]` stays in `[min, max]`.
/// A view wider than the bounds is centered on them.
fn clamp_axis(v: f32, min: f32, max: f32, half: f32) -> f32 {
    let lo = min + half;
    let hi = max - half;
    if lo > hi {
        (min + max) * 0.5
    } else {
        v.clamp(lo, hi)
    }
}

impl Behavior for CameraFollow {
    fn kind(&self) -> BehaviorKind {
        Self::KIND
    }

    fn init(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        self.viewport = ctx.render.viewport;
        self.resize = Some(ctx.events.subscribe(HostEventKind::Resize));
        tracing::debug!(
            node = %ctx.node.short(),
            viewport = ?self.viewport,
            "camera initialized"
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>, _dt: f64) -> Result<(), BehaviorError> {
        if let Some(handle) = &self.resize {
            while let Some(event) = ctx.events.poll(handle) {
                if let HostEvent::Resize { width, height } = event {
                    self.viewport = Vec2::new(width, height);
                }
            }
        }

        ctx.graph.set_scale(ctx.node, self.desired_scale);

        let Some(target_pos) = self.target.and_then(|t| ctx.graph.position(t)) else {
            return Ok(());
        };
        let current = ctx
            .graph
            .position(ctx.node)
            .ok_or(BehaviorError::MissingNode(ctx.node))?;
        let goal = self.goal(target_pos);
        ctx.graph
            .set_position(ctx.node, current + (goal - current) * self.speed);
        Ok(())
    }

    fn destroy(&mut self, events: &mut EventBus) {
        if let Some(handle) = self.resize.take() {
            events.unsubscribe(handle);
        }
    }
}

impl KindedBehavior for CameraFollow {
    const KIND: BehaviorKind = BehaviorKind::Camera;
}
