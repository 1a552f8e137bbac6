//! Behavior protocol and entity controllers.
//!
//! # Invariants
//! - At most one controller per node; `adapt` is idempotent.
//! - Attachment order is init order and update order.
//! - A behavior is initialized at most once and never updated before that.

mod behavior;
mod controller;
mod registry;

pub use behavior::{
    AsAny, Behavior, BehaviorContext, BehaviorError, BehaviorKind, BehaviorState, KindedBehavior,
};
pub use controller::{ControllerState, EntityController, EntityError, Phase};
pub use registry::EntityRegistry;

pub fn crate_info() -> &'static str {
    "marionette-entity v0.1.0"
}
