//! Master targets: the LED and display power switch and brightness.
//!
//! Each `master` entry watches two simulator variables.  The switch
//! variable, tested with the entry's operator, turns the whole LED bank or
//! the display on and off.  The brightness variable is scaled linearly from
//! `min..max` onto the device range `0..=128`, then scaled again by
//! `default / 10000`.

use log::debug;

use crate::app::ports::BrightnessTarget;
use crate::document::{NodeId, TargetRule};
use crate::error::RuleError;
use crate::evaluator::predicate;
use crate::telemetry::{Handle, TelemetryStore};

/// Full device brightness.
pub const MAX_BRIGHTNESS: u8 = 128;

/// `default` is expressed in 1/10000ths.
const SCALE_UNIT: f64 = 10_000.0;

/// Map a brightness telemetry value onto `0..=128`.
pub fn scale_brightness(value: f64, rule: &TargetRule) -> u8 {
    let span = rule.max - rule.min;
    let fraction = if span == 0.0 { 0.0 } else { (value - rule.min) / span };
    let level = fraction * f64::from(MAX_BRIGHTNESS) * rule.default / SCALE_UNIT;
    // NaN falls through clamp and casts to 0.
    level.clamp(0.0, f64::from(MAX_BRIGHTNESS)) as u8
}

/// What changed on a target after a telemetry update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetChange {
    /// The switch flipped to this state.
    pub switched: Option<bool>,
    /// Brightness to write.
    pub brightness: Option<u8>,
}

/// Runtime state of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSlot {
    pub node: NodeId,
    pub target: BrightnessTarget,
    pub switch: Handle,
    pub level: Option<Handle>,
    on: Option<bool>,
    brightness: Option<u8>,
}

impl TargetSlot {
    pub fn new(node: NodeId, target: BrightnessTarget, switch: Handle, level: Option<Handle>) -> Self {
        Self {
            node,
            target,
            switch,
            level,
            on: None,
            brightness: None,
        }
    }

    /// `None` until the first switch decision.
    pub fn is_on(&self) -> Option<bool> {
        self.on
    }

    pub fn watches(&self, handle: Handle) -> bool {
        self.switch == handle || self.level == Some(handle)
    }

    /// Re-derive switch and brightness from the current telemetry.
    ///
    /// Nothing happens until every watched variable has a value.
    pub fn update(&mut self, rule: &TargetRule, store: &TelemetryStore) -> Result<TargetChange, RuleError> {
        let mut change = TargetChange::default();
        let Some(switch) = store.value(self.switch) else {
            return Ok(change);
        };
        let level = match self.level {
            Some(h) => match store.value(h) {
                Some(v) => Some(v),
                None => return Ok(change),
            },
            None => None,
        };

        let op = rule
            .op
            .as_deref()
            .filter(|op| !op.is_empty())
            .ok_or(RuleError::MissingAttribute {
                node: self.node,
                attribute: "op",
            })?;
        let on = predicate(self.node, switch, op)?;

        if self.on != Some(on) {
            debug!("Targets: {} switched {}", rule.id, if on { "on" } else { "off" });
            self.on = Some(on);
            change.switched = Some(on);
            if !on {
                self.brightness = Some(0);
                change.brightness = Some(0);
            }
        }

        if let (true, Some(v)) = (on, level) {
            let b = scale_brightness(v, rule);
            if self.brightness != Some(b) {
                self.brightness = Some(b);
                change.brightness = Some(b);
            }
        }

        Ok(change)
    }
}
