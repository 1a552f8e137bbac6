//! Shared value types for the marionette runtime.
//!
//! # Invariants
//! - Nothing in here owns a host node; `NodeId` is a plain handle.
//! - Host events reach behaviors only through an injected `EventBus`.

mod events;
mod types;

pub use events::{EventBus, HostEvent, HostEventKind, ListenerHandle};
pub use types::{NodeId, Rect, RenderContext, Tiling, Transform2D};

pub fn crate_info() -> &'static str {
    "marionette-common v0.1.0"
}
