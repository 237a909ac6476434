//! Button bindings: press/release dispatch with latching.
//!
//! Every binding node is in one of three modes:
//!
//! ```text
//!            press (normal action)          release
//!   Idle ───────────────────────────▶ Normal ───────▶ Idle
//!     │
//!     │ press while the binding's modal context is active
//!     └─────────────────────────────▶ Modal  ───────▶ Idle
//!                                            release
//! ```
//!
//! A binding that is not idle never fires again until released, so
//! auto-repeat presses are absorbed.  A modal binding latched on press
//! keeps ownership of the release even if the modal context has changed
//! in between.

pub mod modal;

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::app::events::{ActionKind, EngineEvent};
use crate::app::ports::{EventSink, SimPort};
use crate::document::{Action, ActionBinding, ButtonRule, ModalButtonRule, NodeId, NodeKind, RuleNode};
use crate::error::{ActionError, RuleError};
use crate::telemetry::VariableSpec;

/// Press state of one binding node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PressMode {
    #[default]
    Idle,
    /// The binding's own action fired.
    Normal,
    /// A nested modal binding fired.
    Modal,
}

/// Whether a binding of this type dispatches its action on press.
pub fn fires_on_press(press_type: Option<&str>) -> bool {
    matches!(press_type, None | Some("" | "trigger_pos" | "hold"))
}

/// Per-node press latches and the client event ids handed out so far.
#[derive(Debug, Clone)]
pub struct Bindings {
    modes: HashMap<NodeId, PressMode>,
    event_ids: HashMap<NodeId, u32>,
    next_event_id: u32,
}

impl Bindings {
    pub fn new(first_event_id: u32) -> Self {
        Self {
            modes: HashMap::new(),
            event_ids: HashMap::new(),
            next_event_id: first_event_id,
        }
    }

    pub fn mode(&self, node: NodeId) -> PressMode {
        self.modes.get(&node).copied().unwrap_or_default()
    }

    /// Client event id cached for `node`, once its event has been mapped.
    pub fn event_id(&self, node: NodeId) -> Option<u32> {
        self.event_ids.get(&node).copied()
    }

    /// Handle a press of `button` on the first binding assigned to it.
    pub fn press(
        &mut self,
        assignments: &[RuleNode],
        button: u8,
        modal: Option<&str>,
        sim: &mut impl SimPort,
        sink: &mut impl EventSink,
    ) {
        if let Some((node, rule)) = binding_for(assignments, button) {
            self.press_button(node, rule, modal, sim, sink);
        }
    }

    /// Handle a release of `button` on the first binding assigned to it.
    pub fn release(&mut self, assignments: &[RuleNode], button: u8, sink: &mut impl EventSink) {
        if let Some((node, _)) = binding_for(assignments, button) {
            self.release_button(node, button, sink);
        }
    }

    fn press_button(
        &mut self,
        node: &RuleNode,
        rule: &ButtonRule,
        modal: Option<&str>,
        sim: &mut impl SimPort,
        sink: &mut impl EventSink,
    ) {
        if self.mode(node.id) != PressMode::Idle {
            trace!("Bindings: button {} already latched", rule.nr);
            return;
        }

        match self.press_modal(node, rule.nr, modal, sim, sink) {
            Some(true) => {
                self.modes.insert(node.id, PressMode::Modal);
                return;
            }
            Some(false) => return,
            None => {}
        }

        if let Some(kind) = self.fire(node.id, rule.press_type.as_deref(), &rule.action, sim) {
            self.modes.insert(node.id, PressMode::Normal);
            sink.emit(&EngineEvent::ButtonFired {
                button: rule.nr,
                node: node.id,
                modal: false,
                action: kind,
            });
        }
    }

    /// Fire the first modal child bound to the active context.
    ///
    /// `None` when no child applies, otherwise whether its action fired.
    fn press_modal(
        &mut self,
        parent: &RuleNode,
        button: u8,
        modal: Option<&str>,
        sim: &mut impl SimPort,
        sink: &mut impl EventSink,
    ) -> Option<bool> {
        let modal = modal?;
        let (node, rule) = parent.children.iter().find_map(|child| match &child.kind {
            NodeKind::ModalButton(rule) if rule.shift_state == modal => Some((child, rule)),
            _ => None,
        })?;
        Some(self.press_modal_button(node, rule, button, sim, sink))
    }

    fn press_modal_button(
        &mut self,
        node: &RuleNode,
        rule: &ModalButtonRule,
        button: u8,
        sim: &mut impl SimPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let Some(kind) = self.fire(node.id, rule.press_type.as_deref(), &rule.action, sim) else {
            return false;
        };
        self.modes.insert(node.id, PressMode::Modal);
        sink.emit(&EngineEvent::ButtonFired {
            button,
            node: node.id,
            modal: true,
            action: kind,
        });
        true
    }

    fn release_button(&mut self, node: &RuleNode, button: u8, sink: &mut impl EventSink) {
        let mut consumed = false;
        for child in &node.children {
            if self.modes.get(&child.id) == Some(&PressMode::Modal) {
                self.modes.remove(&child.id);
                sink.emit(&EngineEvent::ButtonReleased { button, node: child.id });
                consumed = true;
            }
        }

        let previous = self.modes.remove(&node.id);
        if !consumed && previous == Some(PressMode::Normal) {
            sink.emit(&EngineEvent::ButtonReleased { button, node: node.id });
        }
    }

    /// Dispatch the press action if the binding type calls for one.
    /// `None` on failure, which leaves the binding unlatched.
    fn fire(
        &mut self,
        node: NodeId,
        press_type: Option<&str>,
        action: &Action,
        sim: &mut impl SimPort,
    ) -> Option<ActionKind> {
        if !fires_on_press(press_type) {
            return Some(ActionKind::None);
        }
        match self.dispatch(node, action, sim) {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("Bindings: node {} action failed: {}", node, e);
                None
            }
        }
    }

    fn dispatch(
        &mut self,
        node: NodeId,
        action: &Action,
        sim: &mut impl SimPort,
    ) -> Result<ActionKind, ActionError> {
        let Some(binding) = action.binding() else {
            return Ok(ActionKind::None);
        };
        match binding {
            ActionBinding::Custom(name) => {
                sim.custom_command(name)?;
                Ok(ActionKind::Custom)
            }
            ActionBinding::Event(name) => {
                let id = self.map_event(node, name, sim)?;
                sim.transmit_event(id, event_payload(action.on))?;
                Ok(ActionKind::Event)
            }
            ActionBinding::Variable(spec) => {
                let parsed = VariableSpec::parse(spec, None).ok_or_else(|| RuleError::BadVariableSpec {
                    node,
                    spec: spec.to_owned(),
                })?;
                sim.write_variable(&parsed, action.on.unwrap_or(0.0))?;
                Ok(ActionKind::Variable)
            }
            ActionBinding::Expression(code) => {
                let result = sim.execute_expression(code)?;
                debug!("Bindings: '{}' returned {}", code, result);
                Ok(ActionKind::Expression)
            }
        }
    }

    /// Event id for `node`, mapping it on the host the first time.
    fn map_event(&mut self, node: NodeId, name: &str, sim: &mut impl SimPort) -> Result<u32, ActionError> {
        if let Some(&id) = self.event_ids.get(&node) {
            return Ok(id);
        }
        let id = self.next_event_id;
        sim.map_event(id, name)?;
        debug!("Bindings: mapped '{}' to client event {}", name, id);
        self.event_ids.insert(node, id);
        self.next_event_id += 1;
        Ok(id)
    }
}

/// First `button` node bound to `button`.  Later duplicates never fire.
fn binding_for(assignments: &[RuleNode], button: u8) -> Option<(&RuleNode, &ButtonRule)> {
    assignments.iter().find_map(|node| match &node.kind {
        NodeKind::Button(rule) if rule.nr == button => Some((node, rule)),
        NodeKind::Button(_) => None,
        _ => {
            warn!(
                "Bindings: {}",
                RuleError::UnexpectedNode {
                    node: node.id,
                    expected: "button",
                }
            );
            None
        }
    })
}

/// Negative payloads are sent two's-complement.
fn event_payload(on: Option<f64>) -> u32 {
    on.unwrap_or(0.0) as i64 as u32
}
