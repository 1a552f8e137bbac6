//! Scene: the owner of initialization and per-frame update ordering.
//!
//! # Invariants
//! - The reachable tree is initialized once before any update runs.
//! - Update order is pre-order over the live tree, siblings left to right,
//!   behaviors in attachment order.
//! - A behavior attached after init gets its `init` before its first
//!   `update`, in the same pass.
//! - A failing behavior during update costs only its own node the frame.

mod report;
mod scene;

pub use report::{BehaviorFault, FrameReport};
pub use scene::{Scene, SceneConfig, SceneError};

pub fn crate_info() -> &'static str {
    "marionette-scene v0.1.0"
}
