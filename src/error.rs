//! Unified error types for the engine.
//!
//! Two families live here.  Fatal errors ([`Error`], [`ValidationError`])
//! stop startup.  Non-fatal errors ([`RuleError`], [`ActionError`],
//! [`OutputError`], [`SimError`], [`TelemetryError`]) are returned from individual
//! operations, logged by the caller, and never abort a tree walk.

use core::fmt;

use crate::document::NodeId;
use crate::telemetry::Handle;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fatal startup failure funnels into this type.
#[derive(Debug)]
pub enum Error {
    /// The rule document or config file could not be read.
    Io(std::io::Error),
    /// The rule document or config file is not well-formed JSON of the
    /// expected shape.
    Parse(serde_json::Error),
    /// A loaded value violates a hard limit.
    Validation(ValidationError),
    /// The render thread could not be spawned.
    Spawn(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Spawn(e) => write!(f, "render thread: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Spawn(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Validation(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors (fatal at load time)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A sequence blinks faster than the render loop can keep up with.
    SpeedTooHigh { sequence: String, speed: f64, max: f64 },
    /// A sequence speed is not positive, or too small for its tick to be timed.
    InvalidSpeed { sequence: String, speed: f64 },
    /// A sequence has no symbols.
    EmptyPattern { sequence: String },
    /// Two sequences share a name.
    DuplicateSequence { sequence: String },
    /// A button number lies outside `1..=button_count`.
    ButtonOutOfRange { button: u8, count: u8 },
    /// An engine config field failed range validation.
    Config(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpeedTooHigh { sequence, speed, max } => write!(
                f,
                "speed {speed} of sequence '{sequence}' is greater than the maximum {max}"
            ),
            Self::InvalidSpeed { sequence, speed } => {
                write!(f, "speed {speed} of sequence '{sequence}' gives no usable tick")
            }
            Self::EmptyPattern { sequence } => write!(f, "sequence '{sequence}' has an empty pattern"),
            Self::DuplicateSequence { sequence } => write!(f, "sequence '{sequence}' is defined twice"),
            Self::ButtonOutOfRange { button, count } => {
                write!(f, "button {button} is outside 1..={count}")
            }
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Rule errors (non-fatal, contained within a tree branch)
// ---------------------------------------------------------------------------

/// A malformed piece of the rule document discovered while walking it.
///
/// The walk that hits one of these treats the offending branch as
/// non-matching and carries on with its siblings.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    /// A required attribute is absent or empty.
    MissingAttribute { node: NodeId, attribute: &'static str },
    /// The numeric part of an operator could not be parsed.
    BadLiteral { node: NodeId, op: String },
    /// A variable spec is not of the form `NAME%unit`.
    BadVariableSpec { node: NodeId, spec: String },
    /// A state node has no registered telemetry subscription.
    NoSubscription { node: NodeId },
    /// A node of the wrong kind appeared where another was expected.
    UnexpectedNode { node: NodeId, expected: &'static str },
    /// A target id is neither `led` nor `mfd`.
    UnknownTarget { node: NodeId, id: String },
}

impl RuleError {
    /// The node the error was found on.
    pub fn node(&self) -> NodeId {
        match self {
            Self::MissingAttribute { node, .. }
            | Self::BadLiteral { node, .. }
            | Self::BadVariableSpec { node, .. }
            | Self::NoSubscription { node }
            | Self::UnexpectedNode { node, .. }
            | Self::UnknownTarget { node, .. } => *node,
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAttribute { node, attribute } => {
                write!(f, "node {node}: missing attribute '{attribute}'")
            }
            Self::BadLiteral { node, op } => write!(f, "node {node}: bad numeric literal in op '{op}'"),
            Self::BadVariableSpec { node, spec } => {
                write!(f, "node {node}: variable spec '{spec}' is not NAME%unit")
            }
            Self::NoSubscription { node } => write!(f, "node {node}: no telemetry subscription"),
            Self::UnexpectedNode { node, expected } => write!(f, "node {node}: expected {expected}"),
            Self::UnknownTarget { node, id } => write!(f, "node {node}: unknown target '{id}'"),
        }
    }
}

impl std::error::Error for RuleError {}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// A write to the output device failed.  Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// The device rejected or dropped the write.
    WriteFailed(String),
    /// The device is not connected.
    Disconnected,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed(msg) => write!(f, "write failed: {msg}"),
            Self::Disconnected => write!(f, "device disconnected"),
        }
    }
}

impl std::error::Error for OutputError {}

/// A request to the simulation host failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// The host refused the request.
    Rejected(String),
    /// No connection to the host.
    NotConnected,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for SimError {}

/// A button binding could not dispatch its action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The binding itself is malformed.
    Rule(RuleError),
    /// The simulation host refused the request.
    Sim(SimError),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(e) => write!(f, "{e}"),
            Self::Sim(e) => write!(f, "simulator {e}"),
        }
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rule(e) => Some(e),
            Self::Sim(e) => Some(e),
        }
    }
}

impl From<RuleError> for ActionError {
    fn from(e: RuleError) -> Self {
        Self::Rule(e)
    }
}

impl From<SimError> for ActionError {
    fn from(e: SimError) -> Self {
        Self::Sim(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// A value arrived for a handle that was never registered.
    UnknownHandle(Handle),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHandle(h) => write!(f, "unknown subscription handle {h}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias for fatal errors.
pub type Result<T> = core::result::Result<T, Error>;
