//! Port traits — the boundary between the rule engine and the outside world.
//!
//! ```text
//!   Telemetry / buttons ──▶ Engine ──▶ OutputPort (lights, display)
//!                             │
//!                             └──────▶ SimPort (events, variables)
//! ```
//!
//! Adapters implement these traits.  The [`Engine`](super::service::Engine)
//! consumes them, so the rule logic never touches a device or the
//! simulator directly and runs unchanged against mocks in tests.

use std::time::Instant;

use crate::error::{OutputError, SimError};
use crate::telemetry::VariableSpec;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: engine → controller)
// ───────────────────────────────────────────────────────────────

/// Which brightness channel to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrightnessTarget {
    Led,
    Mfd,
}

impl BrightnessTarget {
    /// Parse a target id from the rule document.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "led" => Some(Self::Led),
            "mfd" => Some(Self::Mfd),
            _ => None,
        }
    }
}

/// Write-side port to the controller.
///
/// Shared between the dispatch context and the sequence render thread,
/// so methods take `&self`.  The render thread calls
/// [`set_indicator`](Self::set_indicator) while holding the sequence
/// lock: implementations must return quickly and never block on the
/// engine.
pub trait OutputPort: Send + Sync {
    /// Set an indicator (`t1`, `fire`, …) to a named state
    /// (`off`, `on`, `amber`, `green`, `red`, …).
    fn set_indicator(&self, indicator: &str, state: &str) -> Result<(), OutputError>;

    /// Overwrite one display line.  0 = top.
    fn set_display_line(&self, line: usize, text: &str) -> Result<(), OutputError>;

    /// Switch the modal ("shift") indicator.
    fn set_modal_indicator(&self, on: bool) -> Result<(), OutputError>;

    /// Set LED or display brightness, 0–128.
    fn set_brightness(&self, target: BrightnessTarget, value: u8) -> Result<(), OutputError>;
}

// ───────────────────────────────────────────────────────────────
// Simulator port (driven adapter: engine → simulation host)
// ───────────────────────────────────────────────────────────────

/// Requests a button binding can make of the simulation host.
pub trait SimPort {
    /// Reserved hook for custom commands.  No built-in effect.
    fn custom_command(&mut self, _name: &str) -> Result<(), SimError> {
        Ok(())
    }

    /// Associate a client event id with a named simulator event.
    fn map_event(&mut self, event_id: u32, name: &str) -> Result<(), SimError>;

    /// Fire a previously mapped event with a data payload.
    fn transmit_event(&mut self, event_id: u32, data: u32) -> Result<(), SimError>;

    /// Write a single simulator variable.
    fn write_variable(&mut self, spec: &VariableSpec, value: f64) -> Result<(), SimError>;

    /// Evaluate an expression on the host; returns its numeric result.
    fn execute_expression(&mut self, code: &str) -> Result<f64, SimError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: engine → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The engine reports what it did through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::EngineEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source for the sequence scheduler.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}
