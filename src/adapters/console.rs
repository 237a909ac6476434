//! Console adapters: controller and simulator stand-ins that log.
//!
//! [`ConsoleOutput`] implements [`OutputPort`] by logging every write
//! and remembering the last state of each indicator, display line and
//! brightness channel.  [`ConsoleSim`] implements [`SimPort`] the same
//! way.  Together they let the binary run a rule document end to end
//! without a controller or a simulator attached.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::info;

use crate::app::ports::{BrightnessTarget, OutputPort, SimPort};
use crate::drivers::display::DISPLAY_LINES;
use crate::error::{OutputError, SimError};
use crate::telemetry::VariableSpec;

// ── Output ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Panel {
    indicators: HashMap<String, String>,
    lines: [String; DISPLAY_LINES],
    modal: bool,
    brightness: HashMap<BrightnessTarget, u8>,
}

/// Logging [`OutputPort`].  Shared with the render thread.
#[derive(Debug, Default)]
pub struct ConsoleOutput {
    panel: Mutex<Panel>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last state written to `indicator`.
    pub fn indicator(&self, indicator: &str) -> Option<String> {
        self.panel().indicators.get(indicator).cloned()
    }

    pub fn display_line(&self, line: usize) -> Option<String> {
        self.panel().lines.get(line).cloned()
    }

    pub fn modal(&self) -> bool {
        self.panel().modal
    }

    pub fn brightness(&self, target: BrightnessTarget) -> Option<u8> {
        self.panel().brightness.get(&target).copied()
    }

    fn panel(&self) -> MutexGuard<'_, Panel> {
        self.panel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputPort for ConsoleOutput {
    fn set_indicator(&self, indicator: &str, state: &str) -> Result<(), OutputError> {
        info!("LED   | {:<8} {}", indicator, state);
        self.panel()
            .indicators
            .insert(indicator.to_owned(), state.to_owned());
        Ok(())
    }

    fn set_display_line(&self, line: usize, text: &str) -> Result<(), OutputError> {
        let mut panel = self.panel();
        let slot = panel
            .lines
            .get_mut(line)
            .ok_or_else(|| OutputError::WriteFailed(format!("no display line {line}")))?;
        info!("MFD   | {} '{}'", line, text);
        text.clone_into(slot);
        Ok(())
    }

    fn set_modal_indicator(&self, on: bool) -> Result<(), OutputError> {
        info!("SHIFT | {}", if on { "on" } else { "off" });
        self.panel().modal = on;
        Ok(())
    }

    fn set_brightness(&self, target: BrightnessTarget, value: u8) -> Result<(), OutputError> {
        info!("DIM   | {:?} {}", target, value);
        self.panel().brightness.insert(target, value);
        Ok(())
    }
}

// ── Simulator ─────────────────────────────────────────────────

/// Logging [`SimPort`].  Rejects events that were never mapped.
#[derive(Debug, Default)]
pub struct ConsoleSim {
    events: HashMap<u32, String>,
}

impl ConsoleSim {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name mapped to a client event id.
    pub fn event_name(&self, id: u32) -> Option<&str> {
        self.events.get(&id).map(String::as_str)
    }
}

impl SimPort for ConsoleSim {
    fn custom_command(&mut self, name: &str) -> Result<(), SimError> {
        info!("SIM   | custom '{}' (no effect)", name);
        Ok(())
    }

    fn map_event(&mut self, event_id: u32, name: &str) -> Result<(), SimError> {
        info!("SIM   | map {} -> {}", event_id, name);
        self.events.insert(event_id, name.to_owned());
        Ok(())
    }

    fn transmit_event(&mut self, event_id: u32, data: u32) -> Result<(), SimError> {
        let name = self
            .events
            .get(&event_id)
            .ok_or_else(|| SimError::Rejected(format!("event {event_id} not mapped")))?;
        info!("SIM   | event {} data={}", name, data);
        Ok(())
    }

    fn write_variable(&mut self, spec: &VariableSpec, value: f64) -> Result<(), SimError> {
        info!("SIM   | set {} = {}", spec, value);
        Ok(())
    }

    fn execute_expression(&mut self, code: &str) -> Result<f64, SimError> {
        info!("SIM   | exec '{}'", code);
        Ok(0.0)
    }
}
