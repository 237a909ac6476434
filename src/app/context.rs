//! Engine-owned runtime state.
//!
//! Everything the engine remembers between calls lives here, keyed by
//! [`NodeId`] where it belongs to a rule node.  The rule document itself
//! is never written to.

use std::collections::HashMap;

use log::{debug, warn};

use crate::bindings::Bindings;
use crate::bindings::modal::ModalContext;
use crate::config::EngineConfig;
use crate::document::{NodeId, NodeKind, RuleDocument, RuleNode, StateRule, TargetRule, walk};
use crate::drivers::button::ButtonStates;
use crate::drivers::display::DisplayCache;
use crate::error::RuleError;
use crate::evaluator::ValueSource;
use crate::targets::TargetSlot;
use crate::telemetry::{Handle, TelemetryStore, VariableSpec};

use super::ports::BrightnessTarget;

#[derive(Debug)]
pub struct EngineContext {
    pub telemetry: TelemetryStore,
    /// State node → subscription it reads.
    pub state_handles: HashMap<NodeId, Handle>,
    /// Indicator node → light last written (solid) or requested (sequence).
    pub last_light: HashMap<NodeId, String>,
    pub buttons: ButtonStates,
    pub bindings: Bindings,
    pub modal: ModalContext,
    pub display: DisplayCache,
    pub targets: Vec<TargetSlot>,
}

impl EngineContext {
    /// Register a subscription for every state node and every target.
    ///
    /// Malformed specs are logged and leave their node unsubscribed.
    pub fn new(doc: &RuleDocument, config: &EngineConfig) -> Self {
        let mut ctx = Self {
            telemetry: TelemetryStore::new(),
            state_handles: HashMap::new(),
            last_light: HashMap::new(),
            buttons: ButtonStates::new(config.button_count),
            bindings: Bindings::new(config.first_event_id),
            modal: ModalContext::new(),
            display: DisplayCache::new(config.display_line_len),
            targets: Vec::new(),
        };

        let _ = walk(doc.indicators(), &mut |node: &RuleNode| {
            if let NodeKind::State(rule) = &node.kind {
                if let Err(e) = ctx.register_state(node.id, rule) {
                    warn!("Context: {}", e);
                }
            }
            Ok::<(), RuleError>(())
        });

        for node in doc.targets() {
            if let NodeKind::Target(rule) = &node.kind {
                match ctx.register_target(node.id, rule) {
                    Ok(slot) => ctx.targets.push(slot),
                    Err(e) => warn!("Context: {}", e),
                }
            }
        }

        debug!(
            "Context: {} subscriptions, {} targets",
            ctx.telemetry.len(),
            ctx.targets.len()
        );
        ctx
    }

    fn register_state(&mut self, node: NodeId, rule: &StateRule) -> Result<(), RuleError> {
        let spec = parse_spec(node, rule.dataref.as_deref(), rule.index, "dataref")?;
        let handle = self.telemetry.register(spec, rule.delta);
        self.state_handles.insert(node, handle);
        Ok(())
    }

    fn register_target(&mut self, node: NodeId, rule: &TargetRule) -> Result<TargetSlot, RuleError> {
        let target = BrightnessTarget::from_id(&rule.id).ok_or_else(|| RuleError::UnknownTarget {
            node,
            id: rule.id.clone(),
        })?;
        let switch = parse_spec(node, rule.switch_dataref.as_deref(), None, "switch_dataref")?;
        let level = match rule.brightness_dataref.as_deref() {
            None | Some("") => None,
            Some(s) => Some(parse_spec(node, Some(s), None, "brightness_dataref")?),
        };
        let switch = self.telemetry.register(switch, None);
        let level = level.map(|spec| self.telemetry.register(spec, None));
        Ok(TargetSlot::new(node, target, switch, level))
    }

    /// Whether indicators may be written: no `led` target is switched off.
    pub fn leds_on(&self) -> bool {
        self.target_on(BrightnessTarget::Led)
    }

    /// Whether the display may be written: no `mfd` target is switched off.
    pub fn display_on(&self) -> bool {
        self.target_on(BrightnessTarget::Mfd)
    }

    /// Until its switch value arrives a target counts as on.
    fn target_on(&self, target: BrightnessTarget) -> bool {
        self.targets
            .iter()
            .filter(|t| t.target == target)
            .all(|t| t.is_on() != Some(false))
    }
}

impl ValueSource for EngineContext {
    fn state_value(&self, node: NodeId, rule: &StateRule) -> Result<Option<f64>, RuleError> {
        match self.state_handles.get(&node) {
            Some(&handle) => Ok(self.telemetry.value(handle)),
            None => Err(parse_spec(node, rule.dataref.as_deref(), rule.index, "dataref")
                .err()
                .unwrap_or(RuleError::NoSubscription { node })),
        }
    }
}

fn parse_spec(
    node: NodeId,
    spec: Option<&str>,
    index: Option<u8>,
    attribute: &'static str,
) -> Result<VariableSpec, RuleError> {
    let spec = spec
        .filter(|s| !s.is_empty())
        .ok_or(RuleError::MissingAttribute { node, attribute })?;
    VariableSpec::parse(spec, index).ok_or_else(|| RuleError::BadVariableSpec {
        node,
        spec: spec.to_owned(),
    })
}
