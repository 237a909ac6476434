//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each engine event as one log line.
//! A UI or network adapter would implement the same trait.

use log::info;

use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EngineEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::IndicatorSet { indicator, light } => {
                info!("LIGHT | {} -> {}", indicator, light);
            }
            EngineEvent::SequenceRequested { indicator, sequence } => {
                info!("BLINK | {} -> {}", indicator, sequence);
            }
            EngineEvent::ButtonFired {
                button,
                node,
                modal,
                action,
            } => {
                info!(
                    "PRESS | button={} node={} modal={} action={:?}",
                    button, node, modal, action
                );
            }
            EngineEvent::ButtonReleased { button, node } => {
                info!("RELEASE | button={} node={}", button, node);
            }
            EngineEvent::ModalChanged(Some(name)) => info!("SHIFT | {}", name),
            EngineEvent::ModalChanged(None) => info!("SHIFT | none"),
            EngineEvent::TargetSwitched { target, on } => {
                info!("MASTER | {} {}", target, if *on { "on" } else { "off" });
            }
            EngineEvent::Started => info!("START | indicators forced"),
        }
    }
}
