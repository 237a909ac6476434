//! Modal ("shift") context resolution.
//!
//! Shift triggers form a tree: a trigger is active when its button is
//! held and none of its nested triggers is active, so the innermost held
//! combination wins.  Among siblings the first held one in document order
//! is taken.
//!
//! ```text
//! shift_states
//! ├── s1 (button 6)           held 6      → "s1"
//! │   └── s2 (button 7)       held 6 + 7  → "s2"
//! └── s3 (button 8)           held 8      → "s3"
//! ```

use log::{debug, warn};

use crate::document::{NodeKind, RuleNode};
use crate::drivers::button::ButtonStates;
use crate::error::RuleError;

/// Name of the innermost active trigger, if any.
pub fn find_active<'a>(triggers: &'a [RuleNode], buttons: &ButtonStates) -> Option<&'a str> {
    for node in triggers {
        let NodeKind::ModalTrigger(trigger) = &node.kind else {
            warn!(
                "Modal: {}",
                RuleError::UnexpectedNode {
                    node: node.id,
                    expected: "shift_state",
                }
            );
            continue;
        };
        if !buttons.is_held(trigger.button) {
            continue;
        }
        if let Some(inner) = find_active(&node.children, buttons) {
            return Some(inner);
        }
        if trigger.name.is_empty() {
            warn!(
                "Modal: {}",
                RuleError::MissingAttribute {
                    node: node.id,
                    attribute: "name",
                }
            );
            continue;
        }
        return Some(&trigger.name);
    }
    None
}

/// The current modal context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalContext {
    active: Option<String>,
}

impl ModalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Recompute from the held buttons.  Returns `true` when the active
    /// name changed, i.e. when the modal indicator must be rewritten.
    pub fn refresh(&mut self, triggers: &[RuleNode], buttons: &ButtonStates) -> bool {
        let found = find_active(triggers, buttons);
        if found == self.active.as_deref() {
            return false;
        }
        debug!("Modal: {:?} -> {:?}", self.active, found);
        self.active = found.map(str::to_owned);
        true
    }
}
