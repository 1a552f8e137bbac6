//! Developer tooling: read-only views over a running scene.
//!
//! # Invariants
//! - Inspection never mutates the graph or any controller.

mod inspector;

pub use inspector::{NodeInfo, OutlineEntry, SceneInspector, SceneSummary};

pub fn crate_info() -> &'static str {
    "marionette-tools v0.1.0"
}
