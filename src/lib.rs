//! x52out library.
//!
//! Drives the indicators, display and shift state of a HOTAS controller
//! from a JSON rule document and a stream of simulator telemetry.  The
//! binary in `main.rs` wires console adapters around [`app::service::Engine`];
//! everything here is usable and testable without a device attached.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bindings;
pub mod config;
pub mod document;
pub mod drivers;
pub mod error;
pub mod evaluator;
pub mod scheduler;
pub mod targets;
pub mod telemetry;
