//! Engine: owns the tick subscription and the run/stop state.
//!
//! # Invariants
//! - One subscribe per start, one unsubscribe per stop; repeated calls are
//!   no-ops.
//! - A stopped engine never drives an update.
//! - Behaviors always see deltas in seconds.

mod config;
mod engine;
mod stats;
mod ticker;

pub use config::{DeltaUnit, EngineConfig};
pub use engine::{Engine, EngineError, EngineState, StopHandle};
pub use stats::{EngineStats, PassSample, PassTimer};
pub use ticker::{FrameClock, ManualTicker, Subscription, TickSource};

pub fn crate_info() -> &'static str {
    "marionette-engine v0.1.0"
}
