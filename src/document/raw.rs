//! Serde shapes of the JSON rule document.
//!
//! These mirror the file layout one-to-one and are converted into the
//! typed [`RuleNode`](super::RuleNode) tree straight after parsing.

use serde::Deserialize;

use super::{Action, SequenceDef};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawDocument {
    pub indicators: Vec<RawIndicator>,
    pub sequences: Vec<SequenceDef>,
    pub assignments: Vec<RawButton>,
    pub shift_states: Vec<RawShiftState>,
    pub master: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawIndicator {
    pub id: String,
    #[serde(default)]
    pub states: Vec<RawState>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawState {
    pub dataref: Option<String>,
    pub index: Option<u8>,
    pub delta: Option<f64>,
    pub op: Option<String>,
    pub light: Option<String>,
    #[serde(default)]
    pub states: Vec<RawState>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawButton {
    pub nr: u8,
    #[serde(rename = "type")]
    pub press_type: Option<String>,
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub shifted_buttons: Vec<RawShiftedButton>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawShiftedButton {
    pub shift_state: String,
    #[serde(rename = "type")]
    pub press_type: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawShiftState {
    pub button: u8,
    pub name: String,
    #[serde(default)]
    pub shift_states: Vec<RawShiftState>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawTarget {
    pub id: String,
    pub switch_dataref: Option<String>,
    pub brightness_dataref: Option<String>,
    pub op: Option<String>,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default = "default_scale")]
    pub default: f64,
}

fn default_max() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    10_000.0
}
