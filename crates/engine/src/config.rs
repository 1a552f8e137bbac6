use marionette_scene::SceneConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::EngineError;

/// Unit of the raw deltas a tick source delivers.
///
/// Behaviors always receive seconds; conversion happens once, in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum DeltaUnit {
    Seconds,
    Milliseconds,
    /// Deltas counted in frames at a nominal rate (1.0 = one frame).
    Frames { rate: f64 },
}

impl DeltaUnit {
    pub fn to_seconds(self, raw: f64) -> f64 {
        match self {
            Self::Seconds => raw,
            Self::Milliseconds => raw / 1000.0,
            Self::Frames { rate } => raw / rate,
        }
    }
}

/// Engine settings, loadable from YAML.
///
/// ```yaml
/// delta_unit:
///   unit: frames
///   rate: 60.0
/// max_delta: 0.1
/// scene:
///   isolate_panics: true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub delta_unit: DeltaUnit,
    /// Upper clamp on the converted delta, in seconds. Keeps a long stall
    /// (debugger, backgrounded tab) from arriving as one huge step.
    pub max_delta: f64,
    /// Passed to the scene the host builds alongside the engine.
    pub scene: SceneConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delta_unit: DeltaUnit::Seconds,
            max_delta: 0.1,
            scene: SceneConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, EngineError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make delta conversion meaningless.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_delta.is_nan() || self.max_delta < 0.0 {
            return Err(EngineError::Invalid(format!(
                "max_delta must be a non-negative number, got {}",
                self.max_delta
            )));
        }
        if let DeltaUnit::Frames { rate } = self.delta_unit {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(EngineError::Invalid(format!(
                    "frame rate must be positive and finite, got {rate}"
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Convert a raw host delta to clamped seconds.
    pub fn delta_seconds(&self, raw: f64) -> f64 {
        let secs = self.delta_unit.to_seconds(raw);
        if secs.is_nan() {
            return 0.0;
        }
        // f64::max drops a NaN bound, so an unvalidated config clamps to 0.
        secs.max(0.0).min(self.max_delta.max(0.0))
    }
}
