//! Outbound engine events.
//!
//! The [`Engine`](super::service::Engine) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log, show in a UI, count in tests).

use crate::document::NodeId;

/// What kind of binding a button press dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Custom,
    Event,
    Variable,
    Expression,
    /// The binding has no action or its type does not fire on press.
    None,
}

/// Structured events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// An indicator was written with a solid state.
    IndicatorSet { indicator: String, light: String },

    /// An indicator was handed to the sequence scheduler.
    SequenceRequested { indicator: String, sequence: String },

    /// A button binding fired its press action.
    ButtonFired {
        button: u8,
        node: NodeId,
        modal: bool,
        action: ActionKind,
    },

    /// A button binding was released.
    ButtonReleased { button: u8, node: NodeId },

    /// The active modal context changed.
    ModalChanged(Option<String>),

    /// A master target was switched on or off.
    TargetSwitched { target: String, on: bool },

    /// The engine has forced every indicator to its logical state.
    Started,
}
