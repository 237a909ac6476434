//! Engine configuration parameters
//!
//! Timing and capacity limits for the rule engine.  Values can be
//! overridden from a JSON file passed on the command line; anything
//! missing falls back to [`EngineConfig::default`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::button::MAX_BUTTONS;
use crate::error::{Error, ValidationError};

/// Core engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Render loop ---
    /// Poll interval while at least one sequence is active (milliseconds)
    pub active_poll_ms: u64,
    /// Poll interval while no sequence is active (milliseconds)
    pub idle_poll_ms: u64,
    /// Fastest allowed sequence speed (ticks per second)
    pub max_speed: f64,

    // --- Controller ---
    /// Number of buttons reported by the controller
    pub button_count: u8,
    /// Characters per display line
    pub display_line_len: usize,

    // --- Simulator ---
    /// First client event id handed out to event-command bindings
    pub first_event_id: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Render loop
            active_poll_ms: 25, // quarter of a 10 Hz tick
            idle_poll_ms: 50,
            max_speed: 10.0,

            // Controller
            button_count: 39,
            display_line_len: 16,

            // Simulator
            first_event_id: 10_000,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the render loop or button vector cannot honour.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(ValidationError::Config("max_speed must be positive"));
        }
        if self.active_poll_ms == 0 {
            return Err(ValidationError::Config("active_poll_ms must be non-zero"));
        }
        // Quarter of the fastest tick keeps perceived timing accurate.
        let quarter_tick_ms = 1000.0 / self.max_speed / 4.0;
        if self.active_poll_ms as f64 > quarter_tick_ms {
            return Err(ValidationError::Config(
                "active_poll_ms is coarser than a quarter of the fastest tick",
            ));
        }
        if self.idle_poll_ms == 0 {
            return Err(ValidationError::Config("idle_poll_ms must be non-zero"));
        }
        if self.button_count == 0 || usize::from(self.button_count) > MAX_BUTTONS {
            return Err(ValidationError::Config("button_count must be within 1..=64"));
        }
        if self.display_line_len == 0 {
            return Err(ValidationError::Config("display_line_len must be non-zero"));
        }
        Ok(())
    }

    pub fn active_poll(&self) -> Duration {
        Duration::from_millis(self.active_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}
