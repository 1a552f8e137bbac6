use marionette_common::{EventBus, NodeId, RenderContext};
use marionette_graph::SceneGraph;
use serde::Serialize;
use std::any::Any;
use std::fmt;

/// Stable identity tag for a behavior kind.
///
/// Lookups on a controller go through this tag rather than through the
/// concrete type, so two unrelated modules agree on "the camera behavior"
/// without sharing anything but the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BehaviorKind {
    Camera,
    Parallax,
    /// Application-defined behavior kinds.
    Named(&'static str),
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Parallax => f.write_str("parallax"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Lifecycle of one attached behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BehaviorState {
    /// Attached, `init` not yet run.
    Attached,
    /// `init` ran once; eligible for `update`.
    Initialized,
    /// Terminal.
    Destroyed,
}

/// Errors a behavior reports from `init` or `update`.
#[derive(Debug, thiserror::Error)]
pub enum BehaviorError {
    #[error("{0}")]
    Failed(String),
    #[error("node {0:?} is not in the scene graph")]
    MissingNode(NodeId),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What a behavior sees of the world while it runs.
pub struct BehaviorContext<'a> {
    /// The node the owning controller is attached to.
    pub node: NodeId,
    pub graph: &'a mut dyn SceneGraph,
    pub render: &'a RenderContext,
    pub events: &'a mut EventBus,
}

/// Object-safe access to `Any` for downcasting attached behaviors.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A reusable, stateful unit of per-frame logic attached to a node.
///
/// `init` runs exactly once before the first `update`. `update` receives the
/// frame delta in seconds. `destroy` must release anything the behavior
/// registered on the event bus.
pub trait Behavior: AsAny + 'static {
    fn kind(&self) -> BehaviorKind;

    fn init(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError>;

    fn update(&mut self, ctx: &mut BehaviorContext<'_>, dt: f64) -> Result<(), BehaviorError>;

    fn destroy(&mut self, _events: &mut EventBus) {}
}

/// Behaviors with a fixed kind, retrievable by type from a controller.
pub trait KindedBehavior: Behavior + Sized {
    const KIND: BehaviorKind;
}

pub(crate) fn downcast_ref<T: Any>(behavior: &dyn Behavior) -> Option<&T> {
    behavior.as_any().downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: Any>(behavior: &mut dyn Behavior) -> Option<&mut T> {
    behavior.as_any_mut().downcast_mut::<T>()
}
