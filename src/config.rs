//! Engine configuration parameters
//!
//! All tunable parameters for the policy engine.
//! Values can be overridden through the settings store
//! (see [`ConfigPort`](crate::app::ports::ConfigPort)).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Hard upper bound on a smoothing window; windows live in fixed-capacity
/// buffers of this size.
pub const SMOOTHING_CAPACITY: usize = 64;

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Timing ---
    /// Execution loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Delay between the first unsaved binding change and auto-save (seconds)
    pub autosave_delay_secs: u32,

    // --- Diagnostics ---
    /// Longest reason string kept on a binding (characters)
    pub max_reason_len: usize,

    // --- Policy language ---
    /// Largest window accepted by `smooth(x, samples)`
    pub max_smoothing_samples: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Timing
            control_loop_interval_ms: 1000, // 1 Hz
            autosave_delay_secs: 5,

            // Diagnostics
            max_reason_len: 256,

            // Policy language
            max_smoothing_samples: SMOOTHING_CAPACITY as u32,
        }
    }
}

impl EngineConfig {
    /// Seconds per execution tick.
    pub fn tick_secs(&self) -> f32 {
        self.control_loop_interval_ms as f32 / 1000.0
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=60_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 100–60000",
            ));
        }
        if !(1..=3600).contains(&self.autosave_delay_secs) {
            return Err(ConfigError::ValidationFailed(
                "autosave_delay_secs must be 1–3600",
            ));
        }
        if !(16..=4096).contains(&self.max_reason_len) {
            return Err(ConfigError::ValidationFailed(
                "max_reason_len must be 16–4096",
            ));
        }
        if !(1..=SMOOTHING_CAPACITY as u32).contains(&self.max_smoothing_samples) {
            return Err(ConfigError::ValidationFailed(
                "max_smoothing_samples must be 1–64",
            ));
        }
        Ok(())
    }
}
