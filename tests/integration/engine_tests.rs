//! Integration tests for the Engine → evaluator → OutputPort pipeline.
//!
//! Telemetry goes in through `on_value_changed`, and the tests assert on
//! what reached the mock panel and the event sink.

use std::sync::Arc;

use x52out::adapters::time::ManualClock;
use x52out::app::commands::InputCommand;
use x52out::app::events::EngineEvent;
use x52out::app::ports::BrightnessTarget;
use x52out::app::service::Engine;
use x52out::config::EngineConfig;
use x52out::document::RuleDocument;
use x52out::error::{Error, ValidationError};
use x52out::telemetry::Handle;

use crate::mock_hw::{MockPanel, MockSim, PanelCall, RecordingSink, wait_for};

const RULES: &str = r#"{
    "indicators": [
        { "id": "t1", "states": [
            { "dataref": "GEAR%percent", "op": "==100", "light": "green",
              "states": [ { "dataref": "WARN%bool", "op": "==1", "light": "warn" } ] },
            { "dataref": "GEAR%percent", "op": "++0", "light": "amber" }
        ] },
        { "id": "fire", "states": [ { "dataref": "FIRE%bool", "op": "==1", "light": "red" } ] }
    ],
    "sequences": [ { "name": "warn", "pattern": "a ", "loop": 0, "speed": 2 } ],
    "shift_states": [ { "button": 6, "name": "s1", "shift_states": [ { "button": 7, "name": "s2" } ] } ],
    "master": [
        { "id": "led", "switch_dataref": "BUS%bool", "brightness_dataref": "DIM%percent", "op": "==1", "max": 100 },
        { "id": "mfd", "switch_dataref": "MFD%bool", "op": "==1" }
    ]
}"#;

struct Rig {
    engine: Engine,
    panel: Arc<MockPanel>,
    sim: MockSim,
    sink: RecordingSink,
}

impl Rig {
    fn new(rules: &str) -> Self {
        let panel = MockPanel::new();
        let doc = RuleDocument::from_json(rules).unwrap();
        let engine = Engine::new(
            doc,
            EngineConfig::default(),
            panel.clone(),
            Arc::new(ManualClock::new()),
        )
        .unwrap();
        Self {
            engine,
            panel,
            sim: MockSim::new(),
            sink: RecordingSink::new(),
        }
    }

    fn started(rules: &str) -> Self {
        let mut rig = Self::new(rules);
        rig.engine.start(&mut rig.sink);
        rig.panel.take();
        rig.sink.events.clear();
        rig
    }

    fn handle(&self, name: &str) -> Handle {
        self.engine
            .subscriptions()
            .find(|(_, spec, _)| spec.name == name)
            .map(|(h, _, _)| h)
            .unwrap()
    }

    fn set(&mut self, name: &str, value: f64) {
        let h = self.handle(name);
        self.engine.on_value_changed(h, value, &mut self.sink);
    }

    fn poll(&mut self) {
        self.engine.refresh_modal(&mut self.sink);
    }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_forces_every_indicator_to_rest() {
    let mut rig = Rig::new(RULES);
    rig.engine.start(&mut rig.sink);
    assert_eq!(rig.panel.indicator_writes("t1"), vec!["off"]);
    assert_eq!(rig.panel.indicator_writes("fire"), vec!["off"]);
    assert_eq!(rig.sink.events.last(), Some(&EngineEvent::Started));
}

#[test]
fn subscriptions_are_deduplicated() {
    let rig = Rig::new(RULES);
    let mut names: Vec<_> = rig.engine.subscriptions().map(|(_, s, _)| s.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["BUS", "DIM", "FIRE", "GEAR", "MFD", "WARN"]);
}

#[test]
fn sequence_faster_than_maximum_is_fatal() {
    let doc = RuleDocument::from_json(
        r#"{ "sequences": [ { "name": "fast", "pattern": "ag", "speed": 12 } ] }"#,
    )
    .unwrap();
    let result = Engine::new(
        doc,
        EngineConfig::default(),
        MockPanel::new(),
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::SpeedTooHigh { .. }))
    ));
}

#[test]
fn sequence_too_slow_to_time_is_fatal() {
    let doc = RuleDocument::from_json(
        r#"{
            "indicators": [ { "id": "t1", "states": [ { "dataref": "A%bool", "op": "==1", "light": "crawl" } ] } ],
            "sequences": [ { "name": "crawl", "pattern": "ag", "speed": 1e-30 } ]
        }"#,
    )
    .unwrap();
    let result = Engine::new(
        doc,
        EngineConfig::default(),
        MockPanel::new(),
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::InvalidSpeed { .. }))
    ));
}

#[test]
fn invalid_config_is_fatal() {
    let config = EngineConfig {
        active_poll_ms: 100,
        ..EngineConfig::default()
    };
    let result = Engine::new(
        RuleDocument::default(),
        config,
        MockPanel::new(),
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(result, Err(Error::Validation(ValidationError::Config(_)))));
}

// ── Evaluation ────────────────────────────────────────────────

#[test]
fn telemetry_change_writes_only_what_changed() {
    let mut rig = Rig::started(RULES);
    rig.set("GEAR", 100.0);
    assert_eq!(
        rig.panel.take(),
        vec![PanelCall::Indicator("t1".into(), "green".into())]
    );

    rig.set("GEAR", 100.0);
    rig.set("FIRE", 0.0);
    assert!(rig.panel.take().is_empty());

    rig.set("GEAR", 50.0);
    assert_eq!(
        rig.panel.take(),
        vec![PanelCall::Indicator("t1".into(), "amber".into())]
    );
}

#[test]
fn inner_state_schedules_sequence_then_outer_takes_over() {
    let mut rig = Rig::started(RULES);
    rig.set("GEAR", 100.0);
    rig.set("WARN", 1.0);

    let snap = rig.engine.sequences().snapshot("t1").unwrap();
    assert_eq!(snap.pattern, "a ");
    assert_eq!(snap.speed, 2.0);
    assert!(rig.sink.contains(&EngineEvent::SequenceRequested {
        indicator: "t1".into(),
        sequence: "warn".into(),
    }));
    assert!(wait_for(|| rig.panel.last_indicator("t1").as_deref() == Some("amber")));

    // Re-evaluation with the same light does not restart the sequence.
    rig.set("FIRE", 1.0);
    assert_eq!(rig.engine.sequences().snapshot("t1").unwrap().start, snap.start);

    rig.set("WARN", 0.0);
    assert!(!rig.engine.sequences().is_active("t1"));
    assert_eq!(rig.panel.last_indicator("t1").as_deref(), Some("green"));
}

#[test]
fn failed_write_is_retried_on_next_evaluation() {
    let mut rig = Rig::started(RULES);
    rig.panel.set_failing(true);
    rig.set("FIRE", 1.0);
    assert!(rig.panel.indicator_writes("fire").is_empty());

    rig.panel.set_failing(false);
    rig.set("GEAR", 0.0);
    assert_eq!(rig.panel.indicator_writes("fire"), vec!["red"]);
}

#[test]
fn unknown_handle_is_ignored() {
    let mut rig = Rig::started(RULES);
    rig.engine.on_value_changed(Handle(999), 1.0, &mut rig.sink);
    assert!(rig.panel.take().is_empty());
    assert!(rig.sink.events.is_empty());
}

#[test]
fn malformed_state_does_not_stop_other_indicators() {
    let mut rig = Rig::started(
        r#"{ "indicators": [
            { "id": "t1", "states": [ { "dataref": "A%bool", "op": "==oops", "light": "red" } ] },
            { "id": "t2", "states": [ { "dataref": "A%bool", "op": "==1", "light": "green" } ] }
        ] }"#,
    );
    rig.set("A", 1.0);
    assert_eq!(
        rig.panel.take(),
        vec![PanelCall::Indicator("t2".into(), "green".into())]
    );
}

// ── Targets ───────────────────────────────────────────────────

#[test]
fn led_target_switches_and_dims() {
    let mut rig = Rig::started(RULES);
    rig.set("GEAR", 100.0);
    rig.set("BUS", 1.0);
    // Brightness value still unknown: nothing switches yet.
    assert!(!rig.sink.events.iter().any(|e| matches!(e, EngineEvent::TargetSwitched { .. })));
    rig.panel.take();

    rig.set("DIM", 50.0);
    let calls = rig.panel.take();
    // Switching on forces every indicator, then writes brightness.
    assert!(calls.contains(&PanelCall::Indicator("t1".into(), "green".into())));
    assert!(calls.contains(&PanelCall::Indicator("fire".into(), "off".into())));
    assert_eq!(calls.last(), Some(&PanelCall::Brightness(BrightnessTarget::Led, 64)));
    assert!(rig.sink.contains(&EngineEvent::TargetSwitched {
        target: "led".into(),
        on: true,
    }));

    rig.set("DIM", 50.0);
    assert!(rig.panel.take().is_empty());

    rig.set("BUS", 0.0);
    let calls = rig.panel.take();
    assert!(calls.contains(&PanelCall::Indicator("t1".into(), "off".into())));
    assert!(calls.contains(&PanelCall::Brightness(BrightnessTarget::Led, 0)));
}

#[test]
fn any_led_target_off_holds_indicators_dark() {
    let mut rig = Rig::started(
        r#"{
            "indicators": [ { "id": "t1", "states": [ { "dataref": "GEAR%bool", "op": "==1", "light": "green" } ] } ],
            "master": [
                { "id": "led", "switch_dataref": "BUS%bool", "op": "==1" },
                { "id": "led", "switch_dataref": "AUX%bool", "op": "==1" }
            ]
        }"#,
    );
    rig.set("BUS", 1.0);
    rig.set("AUX", 1.0);
    rig.set("AUX", 0.0);
    assert_eq!(rig.panel.last_indicator("t1").as_deref(), Some("off"));
    rig.panel.take();

    // BUS is still on, but AUX keeps the indicators dark.
    rig.set("GEAR", 1.0);
    assert!(rig.panel.take().is_empty());

    rig.set("AUX", 1.0);
    assert!(rig.panel.take().contains(&PanelCall::Indicator("t1".into(), "green".into())));
}

#[test]
fn led_off_stops_sequences() {
    let mut rig = Rig::started(RULES);
    rig.set("BUS", 1.0);
    rig.set("DIM", 100.0);
    rig.set("GEAR", 100.0);
    rig.set("WARN", 1.0);
    assert!(rig.engine.sequences().is_active("t1"));

    rig.set("BUS", 0.0);
    assert!(rig.engine.sequences().is_empty());
}

#[test]
fn mfd_target_blanks_and_restores_display() {
    let mut rig = Rig::started(RULES);
    rig.engine.write_display(0, "GEAR DOWN AND LOCKED");
    assert_eq!(rig.panel.take(), vec![PanelCall::Line(0, "GEAR DOWN AND LO".into())]);

    rig.set("MFD", 0.0);
    let calls = rig.panel.take();
    assert_eq!(calls.iter().filter(|c| matches!(c, PanelCall::Line(_, t) if t.is_empty())).count(), 3);

    // Cached only while off.
    rig.engine.write_display(1, "FLAPS 2");
    assert!(rig.panel.take().is_empty());

    rig.set("MFD", 1.0);
    let calls = rig.panel.take();
    assert!(calls.contains(&PanelCall::Line(0, "GEAR DOWN AND LO".into())));
    assert!(calls.contains(&PanelCall::Line(1, "FLAPS 2".into())));
}

// ── Display ───────────────────────────────────────────────────

#[test]
fn display_writes_are_deduplicated() {
    let mut rig = Rig::started(RULES);
    rig.engine.write_display(2, "HDG 270");
    rig.engine.write_display(2, "HDG 270");
    rig.engine.write_display(5, "nowhere");
    assert_eq!(rig.panel.take(), vec![PanelCall::Line(2, "HDG 270".into())]);
}

// ── Modal context ─────────────────────────────────────────────

#[test]
fn nested_triggers_drive_modal_indicator() {
    let mut rig = Rig::started(RULES);

    rig.engine.button_pressed(6, &mut rig.sim, &mut rig.sink);
    rig.poll();
    assert_eq!(rig.engine.modal(), Some("s1"));

    rig.engine.button_pressed(7, &mut rig.sim, &mut rig.sink);
    rig.poll();
    assert_eq!(rig.engine.modal(), Some("s2"));

    rig.engine.button_released(7, &mut rig.sink);
    rig.poll();
    assert_eq!(rig.engine.modal(), Some("s1"));

    // Nothing changed: no write.
    rig.poll();

    rig.engine.button_released(6, &mut rig.sink);
    rig.poll();
    assert_eq!(rig.engine.modal(), None);

    assert_eq!(
        rig.panel.take(),
        vec![
            PanelCall::Modal(true),
            PanelCall::Modal(true),
            PanelCall::Modal(true),
            PanelCall::Modal(false),
        ]
    );
    assert_eq!(
        rig.sink.events.last(),
        Some(&EngineEvent::ModalChanged(None))
    );
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn text_commands_drive_the_engine() {
    let mut rig = Rig::started(RULES);
    let fire = rig.handle("FIRE");

    let lines = [
        format!("value {} 1", fire.0),
        "display 0 HELLO".to_owned(),
        "press 6".to_owned(),
        "poll".to_owned(),
    ];
    for line in &lines {
        let cmd: InputCommand = line.parse().unwrap();
        assert!(rig.engine.handle_command(cmd, &mut rig.sim, &mut rig.sink));
    }
    assert!(!rig.engine.handle_command(InputCommand::Quit, &mut rig.sim, &mut rig.sink));

    assert_eq!(
        rig.panel.take(),
        vec![
            PanelCall::Indicator("fire".into(), "red".into()),
            PanelCall::Line(0, "HELLO".into()),
            PanelCall::Modal(true),
        ]
    );
}

#[test]
fn shutdown_stops_the_render_thread() {
    let rig = Rig::started(RULES);
    rig.engine.shutdown();
}
