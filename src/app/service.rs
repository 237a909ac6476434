//! Engine service: the hexagonal core.
//!
//! [`Engine`] owns the rule document, the runtime context and the
//! sequence scheduler.  Telemetry, button edges and display text come in
//! through its methods.  Everything going out flows through port traits:
//! the shared [`OutputPort`] held by the engine and its render thread,
//! plus a [`SimPort`] and [`EventSink`] injected at each call site.
//!
//! ```text
//!  telemetry ─▶ ┌──────────────────────────────┐ ──▶ OutputPort
//!  buttons   ─▶ │            Engine             │ ──▶ SimPort
//!  display   ─▶ │ Evaluator · Bindings · Modal  │ ──▶ EventSink
//!               └──────────────┬───────────────┘
//!                              └──▶ Scheduler ──(render thread)──▶ OutputPort
//! ```

use std::sync::Arc;

use log::{Level, debug, info, log, trace, warn};

use crate::config::EngineConfig;
use crate::document::{NodeId, NodeKind, RuleDocument, TargetRule};
use crate::drivers::button::ButtonEdge;
use crate::drivers::display::DISPLAY_LINES;
use crate::drivers::led_patterns::LightState;
use crate::error::Error;
use crate::evaluator::{Resolution, evaluate};
use crate::scheduler::{RenderTiming, Scheduler, SequenceSet, Upsert};
use crate::targets::TargetChange;
use crate::telemetry::{Handle, VariableSpec};

use super::commands::InputCommand;
use super::context::EngineContext;
use super::events::EngineEvent;
use super::ports::{BrightnessTarget, Clock, EventSink, OutputPort, SimPort};

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct Engine {
    doc: RuleDocument,
    config: EngineConfig,
    ctx: EngineContext,
    output: Arc<dyn OutputPort>,
    scheduler: Scheduler,
}

impl Engine {
    /// Validate the document, register every subscription and start the
    /// render thread.
    ///
    /// Does **not** touch the device yet, call [`start`](Self::start) next.
    pub fn new(
        doc: RuleDocument,
        config: EngineConfig,
        output: Arc<dyn OutputPort>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        config.validate()?;
        doc.validate(&config)?;

        let ctx = EngineContext::new(&doc, &config);
        let timing = RenderTiming {
            active: config.active_poll(),
            idle: config.idle_poll(),
        };
        let scheduler = Scheduler::start(Arc::clone(&output), clock, timing)?;

        info!(
            "Engine: {} indicators, {} sequences, {} bindings, {} subscriptions",
            doc.indicators().len(),
            doc.sequences().len(),
            doc.assignments().len(),
            ctx.telemetry.len()
        );

        Ok(Self {
            doc,
            config,
            ctx,
            output,
            scheduler,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Force every indicator to its current logical state.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.evaluate_indicators(true, sink);
        sink.emit(&EngineEvent::Started);
        info!("Engine started");
    }

    /// Stop the render thread.  Dropping the engine does the same.
    pub fn shutdown(self) {
        self.scheduler.shutdown();
        info!("Engine stopped");
    }

    // ── Inputs ────────────────────────────────────────────────

    /// Store a telemetry value, update targets, then re-evaluate every
    /// indicator.
    pub fn on_value_changed(&mut self, handle: Handle, value: f64, sink: &mut impl EventSink) {
        if let Err(e) = self.ctx.telemetry.on_value_changed(handle, value) {
            warn!("Engine: {}", e);
            return;
        }
        let evaluated = self.update_targets(handle, sink);
        if !evaluated {
            self.evaluate_indicators(false, sink);
        }
    }

    /// A controller button went down (or auto-repeated).
    pub fn button_pressed(&mut self, button: u8, sim: &mut impl SimPort, sink: &mut impl EventSink) {
        match self.ctx.buttons.press(button) {
            None => {
                warn!("Engine: press of unknown button {}", button);
                return;
            }
            Some(ButtonEdge::Repeat) => trace!("Engine: button {} repeat", button),
            Some(_) => debug!("Engine: button {} down", button),
        }
        let modal = self.ctx.modal.active();
        self.ctx
            .bindings
            .press(self.doc.assignments(), button, modal, sim, sink);
    }

    /// A controller button went up.
    pub fn button_released(&mut self, button: u8, sink: &mut impl EventSink) {
        if self.ctx.buttons.release(button).is_none() {
            warn!("Engine: release of unknown button {}", button);
            return;
        }
        debug!("Engine: button {} up", button);
        self.ctx.bindings.release(self.doc.assignments(), button, sink);
    }

    /// Re-derive the modal context from the held buttons.  Call once per
    /// polling cycle, after that cycle's button edges.
    pub fn refresh_modal(&mut self, sink: &mut impl EventSink) {
        if !self.ctx.modal.refresh(self.doc.shift_states(), &self.ctx.buttons) {
            return;
        }
        let active = self.ctx.modal.active();
        if let Err(e) = self.output.set_modal_indicator(active.is_some()) {
            warn!("Engine: modal indicator write failed: {}", e);
        }
        info!("Engine: modal context {:?}", active);
        sink.emit(&EngineEvent::ModalChanged(active.map(str::to_owned)));
    }

    /// Show `text` on display `line`, truncated to the line length.
    ///
    /// Unchanged text is not re-sent.  While the display is switched off
    /// the text is only cached.
    pub fn write_display(&mut self, line: usize, text: &str) {
        if line >= DISPLAY_LINES {
            warn!("Engine: display line {} does not exist", line);
            return;
        }
        let on = self.ctx.display_on();
        let Some(sent) = self.ctx.display.update(line, text) else {
            return;
        };
        if !on {
            return;
        }
        if let Err(e) = self.output.set_display_line(line, sent) {
            warn!("Engine: display line {} write failed: {}", line, e);
        }
    }

    /// Apply one input command.  Returns `false` on [`InputCommand::Quit`].
    pub fn handle_command(
        &mut self,
        cmd: InputCommand,
        sim: &mut impl SimPort,
        sink: &mut impl EventSink,
    ) -> bool {
        match cmd {
            InputCommand::Value { handle, value } => self.on_value_changed(handle, value, sink),
            InputCommand::Press(button) => self.button_pressed(button, sim, sink),
            InputCommand::Release(button) => self.button_released(button, sink),
            InputCommand::Display { line, text } => self.write_display(line, &text),
            InputCommand::Poll => self.refresh_modal(sink),
            InputCommand::Quit => return false,
        }
        true
    }

    // ── Queries ───────────────────────────────────────────────

    /// Every telemetry subscription, for the transport adapter.
    pub fn subscriptions(&self) -> impl Iterator<Item = (Handle, &VariableSpec, Option<f64>)> + '_ {
        self.ctx.telemetry.subscriptions()
    }

    pub fn document(&self) -> &RuleDocument {
        &self.doc
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn sequences(&self) -> &SequenceSet {
        self.scheduler.sequences()
    }

    pub fn modal(&self) -> Option<&str> {
        self.ctx.modal.active()
    }

    // ── Indicators ────────────────────────────────────────────

    /// Walk every indicator and apply what it resolves to.
    ///
    /// With `force` set, solid lights are rewritten even when unchanged.
    /// Skipped entirely while the `led` target is switched off.
    pub fn evaluate_indicators(&mut self, force: bool, sink: &mut impl EventSink) {
        if !self.ctx.leds_on() {
            trace!("Engine: LEDs off, evaluation skipped");
            return;
        }
        let evaluation = evaluate(self.doc.indicators(), &self.ctx);

        let level = if force { Level::Warn } else { Level::Debug };
        for e in &evaluation.errors {
            log!(level, "Engine: {}", e);
        }

        for r in &evaluation.resolutions {
            apply_resolution(
                &self.doc,
                &mut self.ctx,
                &self.scheduler,
                self.output.as_ref(),
                r,
                force,
                sink,
            );
        }
    }

    fn all_indicators_off(&mut self) {
        self.scheduler.cancel_all();
        let off = LightState::Off.as_str();
        for node in self.doc.indicators() {
            let NodeKind::Indicator(indicator) = &node.kind else {
                continue;
            };
            match self.output.set_indicator(&indicator.id, off) {
                Ok(()) => {
                    self.ctx.last_light.insert(node.id, off.to_owned());
                }
                Err(e) => {
                    self.ctx.last_light.remove(&node.id);
                    warn!("Engine: '{}' write failed: {}", indicator.id, e);
                }
            }
        }
    }

    // ── Targets ───────────────────────────────────────────────

    /// Returns `true` if a forced indicator evaluation already ran.
    fn update_targets(&mut self, handle: Handle, sink: &mut impl EventSink) -> bool {
        let mut changes: Vec<(BrightnessTarget, String, TargetChange)> = Vec::new();
        for slot in &mut self.ctx.targets {
            if !slot.watches(handle) {
                continue;
            }
            let Some(rule) = target_rule(&self.doc, slot.node) else {
                continue;
            };
            match slot.update(rule, &self.ctx.telemetry) {
                Ok(change) if change != TargetChange::default() => {
                    changes.push((slot.target, rule.id.clone(), change));
                }
                Ok(_) => {}
                Err(e) => warn!("Engine: {}", e),
            }
        }

        let mut evaluated = false;
        for (target, id, change) in changes {
            if let Some(on) = change.switched {
                match (target, on) {
                    (BrightnessTarget::Led, true) => {
                        self.evaluate_indicators(true, sink);
                        evaluated = true;
                    }
                    (BrightnessTarget::Led, false) => self.all_indicators_off(),
                    (BrightnessTarget::Mfd, true) => self.replay_display(),
                    (BrightnessTarget::Mfd, false) => self.blank_display(),
                }
                sink.emit(&EngineEvent::TargetSwitched { target: id, on });
            }
            if let Some(level) = change.brightness {
                if let Err(e) = self.output.set_brightness(target, level) {
                    warn!("Engine: {:?} brightness write failed: {}", target, e);
                }
            }
        }
        evaluated
    }

    // ── Display ───────────────────────────────────────────────

    fn replay_display(&self) {
        for line in 0..DISPLAY_LINES {
            let text = self.ctx.display.line(line).unwrap_or_default();
            if let Err(e) = self.output.set_display_line(line, text) {
                warn!("Engine: display line {} write failed: {}", line, e);
            }
        }
    }

    fn blank_display(&self) {
        for line in 0..DISPLAY_LINES {
            if let Err(e) = self.output.set_display_line(line, "") {
                warn!("Engine: display line {} write failed: {}", line, e);
            }
        }
    }
}

/// Write or schedule one resolved light.
///
/// A light naming a configured sequence goes to the scheduler, which
/// ignores a repeat of the running pattern.  Anything else is a solid
/// state: it cancels the indicator's sequence and is written unless it
/// matches the last successful write.
fn apply_resolution(
    doc: &RuleDocument,
    ctx: &mut EngineContext,
    scheduler: &Scheduler,
    output: &dyn OutputPort,
    r: &Resolution<'_>,
    force: bool,
    sink: &mut impl EventSink,
) {
    let last = ctx.last_light.get(&r.node).map(String::as_str);

    if let Some(seq) = doc.sequence(r.light) {
        let result = scheduler.upsert(r.indicator, &seq.pattern, seq.loop_count, seq.speed);
        if last != Some(r.light) {
            ctx.last_light.insert(r.node, r.light.to_owned());
        }
        if matches!(result, Upsert::Inserted | Upsert::Replaced) {
            sink.emit(&EngineEvent::SequenceRequested {
                indicator: r.indicator.to_owned(),
                sequence: r.light.to_owned(),
            });
        }
        return;
    }

    if !force && last == Some(r.light) {
        return;
    }
    scheduler.cancel(r.indicator);
    match output.set_indicator(r.indicator, r.light) {
        Ok(()) => {
            ctx.last_light.insert(r.node, r.light.to_owned());
            sink.emit(&EngineEvent::IndicatorSet {
                indicator: r.indicator.to_owned(),
                light: r.light.to_owned(),
            });
        }
        Err(e) => {
            // Forget the light so the next evaluation retries it.
            ctx.last_light.remove(&r.node);
            warn!("Engine: '{}' write failed: {}", r.indicator, e);
        }
    }
}

fn target_rule(doc: &RuleDocument, node: NodeId) -> Option<&TargetRule> {
    doc.targets().iter().find_map(|n| match &n.kind {
        NodeKind::Target(rule) if n.id == node => Some(rule),
        _ => None,
    })
}
