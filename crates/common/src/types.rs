use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle to a node owned by the host scene graph.
///
/// The runtime never owns the node behind the id; it only reads and writes
/// the transform subset exposed by the graph boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for log lines and inspector output.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Planar transform: position, rotation (radians), scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl Transform2D {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// A tiling visual: a texture repeated across the node, shifted by `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tiling {
    pub offset: Vec2,
    pub tile_size: Vec2,
}

impl Tiling {
    pub fn new(tile_size: Vec2) -> Self {
        Self {
            offset: Vec2::ZERO,
            tile_size,
        }
    }
}

/// Axis-aligned rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

/// Read-only view of the host renderer handed to behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    /// Canvas size in pixels.
    pub viewport: Vec2,
}

impl RenderContext {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: Vec2::new(width, height),
        }
    }

    pub fn width(&self) -> f32 {
        self.viewport.x
    }

    pub fn height(&self) -> f32 {
        self.viewport.y
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}
