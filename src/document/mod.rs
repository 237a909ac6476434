//! Rule document: the hierarchical configuration tree.
//!
//! ```text
//! RuleDocument
//! ├── indicators    Indicator ─▶ State ─▶ State …
//! ├── sequences     named blink patterns
//! ├── assignments   Button ─▶ ModalButton …
//! ├── shift_states  ModalTrigger ─▶ ModalTrigger …
//! └── master        Target (led / mfd switch + brightness)
//! ```
//!
//! The tree is loaded once and never mutated afterwards.  Each node gets a
//! [`NodeId`] in depth-first load order; the engine keys all runtime
//! annotations (press latches, last light, subscription handles) by that
//! id instead of writing them back into the tree.

mod raw;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::drivers::led_patterns::tick_duration;
use crate::error::{Error, ValidationError};
use raw::{RawButton, RawDocument, RawIndicator, RawShiftState, RawState, RawTarget};

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// A node of the rule tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub children: Vec<RuleNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Indicator(IndicatorRule),
    State(StateRule),
    Button(ButtonRule),
    ModalButton(ModalButtonRule),
    ModalTrigger(ModalTrigger),
    Target(TargetRule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRule {
    /// Indicator name on the device, e.g. `t1` or `fire`.
    pub id: String,
}

/// A conditional state.  Attributes are optional here so that a missing
/// one only disables its own branch at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRule {
    pub dataref: Option<String>,
    pub index: Option<u8>,
    pub delta: Option<f64>,
    pub op: Option<String>,
    pub light: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonRule {
    pub nr: u8,
    pub press_type: Option<String>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalButtonRule {
    /// Modal context this binding is active in.
    pub shift_state: String,
    pub press_type: Option<String>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModalTrigger {
    /// 1-based controller button that selects this modal context.
    pub button: u8,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetRule {
    pub id: String,
    pub switch_dataref: Option<String>,
    pub brightness_dataref: Option<String>,
    pub op: Option<String>,
    pub min: f64,
    pub max: f64,
    /// Brightness scale in 1/10000ths.
    pub default: f64,
}

/// What a button binding does when it fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    pub custom_command: Option<String>,
    /// Simulator event name.
    pub command: Option<String>,
    /// Variable to write, `NAME%unit`.
    pub dataref: Option<String>,
    pub calculator_code: Option<String>,
    /// Event payload or value to write.
    pub on: Option<f64>,
}

/// The single binding an [`Action`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionBinding<'a> {
    Custom(&'a str),
    Event(&'a str),
    Variable(&'a str),
    Expression(&'a str),
}

impl Action {
    /// First non-empty binding in precedence order: custom hook, event,
    /// variable write, expression.
    pub fn binding(&self) -> Option<ActionBinding<'_>> {
        fn present(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }
        present(&self.custom_command)
            .map(ActionBinding::Custom)
            .or_else(|| present(&self.command).map(ActionBinding::Event))
            .or_else(|| present(&self.dataref).map(ActionBinding::Variable))
            .or_else(|| present(&self.calculator_code).map(ActionBinding::Expression))
    }
}

/// Named blink pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDef {
    pub name: String,
    pub pattern: String,
    /// Number of full passes, 0 = forever.
    #[serde(default, rename = "loop")]
    pub loop_count: u32,
    /// Symbols per second.
    pub speed: f64,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDocument {
    indicators: Vec<RuleNode>,
    sequences: Vec<SequenceDef>,
    assignments: Vec<RuleNode>,
    shift_states: Vec<RuleNode>,
    targets: Vec<RuleNode>,
}

impl RuleDocument {
    /// Parse a JSON rule document.  Syntax and type errors are fatal.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let raw: RawDocument = serde_json::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn from_raw(raw: RawDocument) -> Self {
        let mut ids = IdAlloc::default();
        let indicators = raw.indicators.into_iter().map(|i| ids.indicator(i)).collect();
        let assignments = raw.assignments.into_iter().map(|b| ids.button(b)).collect();
        let shift_states = raw.shift_states.into_iter().map(|s| ids.shift_state(s)).collect();
        let targets = raw.master.into_iter().map(|t| ids.target(t)).collect();
        Self {
            indicators,
            sequences: raw.sequences,
            assignments,
            shift_states,
            targets,
        }
    }

    /// Load-time checks.  Any failure here stops startup.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        for (i, seq) in self.sequences.iter().enumerate() {
            if tick_duration(seq.speed).is_none() {
                return Err(ValidationError::InvalidSpeed {
                    sequence: seq.name.clone(),
                    speed: seq.speed,
                });
            }
            if seq.speed > config.max_speed {
                return Err(ValidationError::SpeedTooHigh {
                    sequence: seq.name.clone(),
                    speed: seq.speed,
                    max: config.max_speed,
                });
            }
            if seq.pattern.is_empty() {
                return Err(ValidationError::EmptyPattern {
                    sequence: seq.name.clone(),
                });
            }
            if self.sequences[..i].iter().any(|s| s.name == seq.name) {
                return Err(ValidationError::DuplicateSequence {
                    sequence: seq.name.clone(),
                });
            }
        }

        let count = config.button_count;
        let check = |button: u8| {
            if button == 0 || button > count {
                Err(ValidationError::ButtonOutOfRange { button, count })
            } else {
                Ok(())
            }
        };
        for node in &self.assignments {
            if let NodeKind::Button(b) = &node.kind {
                check(b.nr)?;
            }
        }
        walk(&self.shift_states, &mut |node: &RuleNode| match &node.kind {
            NodeKind::ModalTrigger(t) => check(t.button),
            _ => Ok(()),
        })
    }

    pub fn indicators(&self) -> &[RuleNode] {
        &self.indicators
    }

    pub fn sequences(&self) -> &[SequenceDef] {
        &self.sequences
    }

    /// Sequence definition named `name`, if any.
    pub fn sequence(&self, name: &str) -> Option<&SequenceDef> {
        self.sequences.iter().find(|s| s.name == name)
    }

    pub fn assignments(&self) -> &[RuleNode] {
        &self.assignments
    }

    pub fn shift_states(&self) -> &[RuleNode] {
        &self.shift_states
    }

    pub fn targets(&self) -> &[RuleNode] {
        &self.targets
    }

    /// Device names of every configured indicator, in document order.
    pub fn indicator_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.indicators.iter().filter_map(|n| match &n.kind {
            NodeKind::Indicator(i) => Some(i.id.as_str()),
            _ => None,
        })
    }
}

/// Depth-first visit, stopping at the first error.
pub fn walk<E>(
    nodes: &[RuleNode],
    visit: &mut impl FnMut(&RuleNode) -> Result<(), E>,
) -> Result<(), E> {
    for node in nodes {
        visit(node)?;
        walk(&node.children, visit)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Raw → typed conversion
// ---------------------------------------------------------------------------

#[derive(Default)]
struct IdAlloc(u32);

impl IdAlloc {
    fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }

    fn indicator(&mut self, raw: RawIndicator) -> RuleNode {
        let id = self.next();
        RuleNode {
            id,
            kind: NodeKind::Indicator(IndicatorRule { id: raw.id }),
            children: raw.states.into_iter().map(|s| self.state(s)).collect(),
        }
    }

    fn state(&mut self, raw: RawState) -> RuleNode {
        let id = self.next();
        RuleNode {
            id,
            kind: NodeKind::State(StateRule {
                dataref: raw.dataref,
                index: raw.index,
                delta: raw.delta,
                op: raw.op,
                light: raw.light,
            }),
            children: raw.states.into_iter().map(|s| self.state(s)).collect(),
        }
    }

    fn button(&mut self, raw: RawButton) -> RuleNode {
        let id = self.next();
        let children = raw
            .shifted_buttons
            .into_iter()
            .map(|s| RuleNode {
                id: self.next(),
                kind: NodeKind::ModalButton(ModalButtonRule {
                    shift_state: s.shift_state,
                    press_type: s.press_type,
                    action: s.action,
                }),
                children: Vec::new(),
            })
            .collect();
        RuleNode {
            id,
            kind: NodeKind::Button(ButtonRule {
                nr: raw.nr,
                press_type: raw.press_type,
                action: raw.action,
            }),
            children,
        }
    }

    fn shift_state(&mut self, raw: RawShiftState) -> RuleNode {
        let id = self.next();
        RuleNode {
            id,
            kind: NodeKind::ModalTrigger(ModalTrigger {
                button: raw.button,
                name: raw.name,
            }),
            children: raw.shift_states.into_iter().map(|s| self.shift_state(s)).collect(),
        }
    }

    fn target(&mut self, raw: RawTarget) -> RuleNode {
        RuleNode {
            id: self.next(),
            kind: NodeKind::Target(TargetRule {
                id: raw.id,
                switch_dataref: raw.switch_dataref,
                brightness_dataref: raw.brightness_dataref,
                op: raw.op,
                min: raw.min,
                max: raw.max,
                default: raw.default,
            }),
            children: Vec::new(),
        }
    }
}
