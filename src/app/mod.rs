//! Application core — rule logic behind port traits.
//!
//! The [`Engine`](service::Engine) wires the evaluator, the button
//! bindings and the sequence scheduler together.  All interaction with
//! the controller and the simulator happens through **port traits**
//! defined in [`ports`], keeping this layer testable with mocks.

pub mod commands;
pub mod context;
pub mod events;
pub mod ports;
pub mod service;
