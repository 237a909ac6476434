//! Integration tests for button dispatch through the Engine.
//!
//! Button edges go in, simulator requests come out of the mock sim.

use std::sync::Arc;

use x52out::adapters::time::ManualClock;
use x52out::app::events::{ActionKind, EngineEvent};
use x52out::app::service::Engine;
use x52out::bindings::PressMode;
use x52out::config::EngineConfig;
use x52out::document::RuleDocument;

use crate::mock_hw::{MockPanel, MockSim, RecordingSink, SimCall};

const RULES: &str = r#"{
    "assignments": [
        { "nr": 1, "type": "trigger_pos", "command": "GEAR_TOGGLE", "on": 1,
          "shifted_buttons": [
            { "shift_state": "s1", "dataref": "FLAPS HANDLE INDEX%number", "on": 2 },
            { "shift_state": "s2", "calculator_code": "(>K:AP_MASTER)" }
          ] },
        { "nr": 2, "type": "hold", "command": "BRAKES" },
        { "nr": 3, "custom_command": "reserved" }
    ],
    "shift_states": [ { "button": 6, "name": "s1", "shift_states": [ { "button": 7, "name": "s2" } ] } ]
}"#;

fn engine() -> (Engine, MockSim, RecordingSink) {
    let doc = RuleDocument::from_json(RULES).unwrap();
    let engine = Engine::new(
        doc,
        EngineConfig::default(),
        MockPanel::new(),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    (engine, MockSim::new(), RecordingSink::new())
}

#[test]
fn press_fires_event_once_until_release() {
    let (mut engine, mut sim, mut sink) = engine();

    engine.button_pressed(1, &mut sim, &mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(
        sim.calls,
        vec![
            SimCall::Map(10_000, "GEAR_TOGGLE".into()),
            SimCall::Transmit(10_000, 1)
        ]
    );

    engine.button_released(1, &mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(sim.calls.last(), Some(&SimCall::Transmit(10_000, 1)));
    assert_eq!(sim.count(|c| matches!(c, SimCall::Transmit(..))), 2);
}

#[test]
fn event_ids_count_up_from_first_event_id() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_pressed(2, &mut sim, &mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);
    assert!(sim.calls.contains(&SimCall::Map(10_000, "BRAKES".into())));
    assert!(sim.calls.contains(&SimCall::Map(10_001, "GEAR_TOGGLE".into())));
}

#[test]
fn modal_binding_owns_press_and_release() {
    let (mut engine, mut sim, mut sink) = engine();
    let button = &engine.document().assignments()[0];
    let (parent, flaps) = (button.id, button.children[0].id);

    engine.button_pressed(6, &mut sim, &mut sink);
    engine.refresh_modal(&mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);

    assert_eq!(sim.calls, vec![SimCall::Write("FLAPS HANDLE INDEX".into(), 2.0)]);
    assert_eq!(engine.context().bindings.mode(parent), PressMode::Modal);
    assert!(sink.contains(&EngineEvent::ButtonFired {
        button: 1,
        node: flaps,
        modal: true,
        action: ActionKind::Variable,
    }));

    // Shift released first; the latched modal binding still gets the release.
    engine.button_released(6, &mut sink);
    engine.refresh_modal(&mut sink);
    engine.button_released(1, &mut sink);
    assert_eq!(engine.context().bindings.mode(flaps), PressMode::Idle);
    assert_eq!(engine.context().bindings.mode(parent), PressMode::Idle);
    assert_eq!(
        sink.events.last(),
        Some(&EngineEvent::ButtonReleased { button: 1, node: flaps })
    );
}

#[test]
fn innermost_context_selects_binding() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_pressed(6, &mut sim, &mut sink);
    engine.button_pressed(7, &mut sim, &mut sink);
    engine.refresh_modal(&mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(sim.calls, vec![SimCall::Exec("(>K:AP_MASTER)".into())]);
}

#[test]
fn modal_context_applies_only_after_poll() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_pressed(6, &mut sim, &mut sink);
    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(sim.calls.last(), Some(&SimCall::Transmit(10_000, 1)));
}

#[test]
fn custom_hook_has_no_effect_beyond_the_port() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_pressed(3, &mut sim, &mut sink);
    assert_eq!(sim.calls, vec![SimCall::Custom("reserved".into())]);
}

#[test]
fn out_of_range_buttons_are_ignored() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_pressed(0, &mut sim, &mut sink);
    engine.button_pressed(40, &mut sim, &mut sink);
    engine.button_released(200, &mut sink);
    assert!(sim.calls.is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn release_without_press_is_silent() {
    let (mut engine, mut sim, mut sink) = engine();
    engine.button_released(1, &mut sink);
    assert!(sink.events.is_empty());
    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(sim.count(|c| matches!(c, SimCall::Transmit(..))), 1);
}

#[test]
fn duplicate_assignment_sends_one_action_per_press() {
    let doc = RuleDocument::from_json(
        r#"{ "assignments": [ { "nr": 1, "command": "A" }, { "nr": 1, "command": "B" } ] }"#,
    )
    .unwrap();
    let mut engine = Engine::new(
        doc,
        EngineConfig::default(),
        MockPanel::new(),
        Arc::new(ManualClock::new()),
    )
    .unwrap();
    let (mut sim, mut sink) = (MockSim::new(), RecordingSink::new());

    engine.button_pressed(1, &mut sim, &mut sink);
    assert_eq!(sim.count(|c| matches!(c, SimCall::Transmit(..))), 1);
    assert!(sim.calls.contains(&SimCall::Map(10_000, "A".into())));
    assert!(!sim.calls.iter().any(|c| matches!(c, SimCall::Map(_, name) if name == "B")));
}
