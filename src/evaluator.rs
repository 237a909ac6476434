//! Indicator rule evaluator.
//!
//! Walks the indicator subtree of the rule document and resolves every
//! indicator to the light it should show right now.  Nothing is written
//! here: the caller applies the resolutions and logs the errors.
//!
//! ```text
//! Indicator t1
//! ├── State  GEAR ==100  → green      ① nested states first
//! │   └── State  GEAR --5 → red       ② innermost match overrides
//! └── State  GEAR ++0    → amber      ③ first sibling match wins
//!                                     ④ nothing matched → "off"
//! ```
//!
//! A malformed state (missing `op`, bad literal, no subscription) only
//! disables its own predicate.  Its nested states and its siblings are
//! still evaluated.

use log::trace;

use crate::document::{NodeId, NodeKind, RuleNode, StateRule};
use crate::error::RuleError;

/// Light shown when no state of an indicator matches.
pub const RESTING_LIGHT: &str = "off";

/// Supplies the current telemetry value behind a state node.
pub trait ValueSource {
    /// `Ok(None)` while no value has arrived for the node's subscription.
    fn state_value(&self, node: NodeId, rule: &StateRule) -> Result<Option<f64>, RuleError>;
}

/// The light an indicator resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Device name of the indicator.
    pub indicator: &'a str,
    /// Indicator node.
    pub node: NodeId,
    /// Either a sequence name or a direct state name.
    pub light: &'a str,
    /// State node that matched, `None` for the resting light.
    pub matched: Option<NodeId>,
}

/// Output of one full walk.
#[derive(Debug, Default, PartialEq)]
pub struct Evaluation<'a> {
    pub resolutions: Vec<Resolution<'a>>,
    pub errors: Vec<RuleError>,
}

/// Evaluate a comparison operator against `value`.
///
/// `==N` equal, `--N` less than, `++N` greater than.  Any other operator
/// prefix is simply false; an unparsable `N` is an error.
pub fn predicate(node: NodeId, value: f64, op: &str) -> Result<bool, RuleError> {
    let Some((prefix, literal)) = op.split_at_checked(2) else {
        return Ok(false);
    };
    let compare: fn(f64, f64) -> bool = match prefix {
        "==" => |v, n| v == n,
        "--" => |v, n| v < n,
        "++" => |v, n| v > n,
        _ => return Ok(false),
    };
    let threshold: f64 = literal.trim().parse().map_err(|_| RuleError::BadLiteral {
        node,
        op: op.to_owned(),
    })?;
    Ok(compare(value, threshold))
}

/// Resolve every indicator in `indicators`.
pub fn evaluate<'a>(indicators: &'a [RuleNode], values: &impl ValueSource) -> Evaluation<'a> {
    let mut out = Evaluation::default();

    for node in indicators {
        let NodeKind::Indicator(indicator) = &node.kind else {
            out.errors.push(RuleError::UnexpectedNode {
                node: node.id,
                expected: "indicator",
            });
            continue;
        };
        if indicator.id.is_empty() {
            out.errors.push(RuleError::MissingAttribute {
                node: node.id,
                attribute: "id",
            });
            continue;
        }

        let hit = first_match(&node.children, values, &mut out.errors);
        let (light, matched) = match hit {
            Some((light, id)) => (light, Some(id)),
            None => (RESTING_LIGHT, None),
        };
        trace!("Evaluator: {} resolves to '{}'", indicator.id, light);
        out.resolutions.push(Resolution {
            indicator: &indicator.id,
            node: node.id,
            light,
            matched,
        });
    }

    out
}

/// First state in `states` (document order) that resolves, recursing
/// into nested states before testing each node's own predicate.
fn first_match<'a>(
    states: &'a [RuleNode],
    values: &impl ValueSource,
    errors: &mut Vec<RuleError>,
) -> Option<(&'a str, NodeId)> {
    for node in states {
        let NodeKind::State(rule) = &node.kind else {
            errors.push(RuleError::UnexpectedNode {
                node: node.id,
                expected: "state",
            });
            continue;
        };

        if let Some(hit) = first_match(&node.children, values, errors) {
            return Some(hit);
        }

        match own_match(node.id, rule, values) {
            Ok(Some(light)) => return Some((light, node.id)),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    None
}

fn own_match<'a>(
    node: NodeId,
    rule: &'a StateRule,
    values: &impl ValueSource,
) -> Result<Option<&'a str>, RuleError> {
    let op = non_empty(&rule.op).ok_or(RuleError::MissingAttribute { node, attribute: "op" })?;
    let light = non_empty(&rule.light).ok_or(RuleError::MissingAttribute {
        node,
        attribute: "light",
    })?;
    let Some(value) = values.state_value(node, rule)? else {
        return Ok(None);
    };
    Ok(predicate(node, value, op)?.then_some(light))
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}
