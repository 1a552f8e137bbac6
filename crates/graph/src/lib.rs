//! Host scene-graph boundary.
//!
//! # Invariants
//! - The runtime reads and writes node state only through `SceneGraph`.
//! - Child order as reported by the graph is traversal order.
//!
//! `NodeTree` is an in-memory implementation used by headless hosts and
//! tests. Adapters for a real renderer implement `SceneGraph` over its
//! display objects instead.

mod graph;
mod tree;

pub use graph::SceneGraph;
pub use tree::{GraphError, NodeData, NodeTree};

pub fn crate_info() -> &'static str {
    "marionette-graph v0.1.0"
}
