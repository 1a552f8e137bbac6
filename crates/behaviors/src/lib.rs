//! Built-in behaviors.
//!
//! # Invariants
//! - Per-frame work allocates nothing.
//! - Parallax offsets stay within one tile.
//! - Attach the camera so it is visited before any parallax background
//!   that reads it; the scene's pre-order walk then guarantees the layers
//!   see this frame's camera position.

mod camera;
mod parallax;

pub use camera::CameraFollow;
pub use parallax::{ParallaxBackground, ParallaxLayer, wrap_offset};

pub fn crate_info() -> &'static str {
    "marionette-behaviors v0.1.0"
}
