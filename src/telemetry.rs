//! Telemetry store.
//!
//! Maps subscription handles to the last value received from the
//! simulation host.  The transport adapter reads [`TelemetryStore::subscriptions`]
//! once at startup to request change notifications, then feeds every
//! notification back through [`TelemetryStore::on_value_changed`].
//!
//! Registration is deduplicated: the same variable name, unit and index
//! always map to the same handle, no matter how many rule nodes watch it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;

use crate::error::TelemetryError;

/// Stable identifier correlating a subscription with its stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A simulator variable: name, unit, and optional array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableSpec {
    pub name: String,
    pub unit: String,
    pub index: Option<u8>,
}

impl VariableSpec {
    /// Parse the `NAME%unit` form used in rule documents.
    ///
    /// Returns `None` when the separator is missing or the name is empty.
    pub fn parse(spec: &str, index: Option<u8>) -> Option<Self> {
        let (name, unit) = spec.split_once('%')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_owned(),
            unit: unit.trim().to_owned(),
            index,
        })
    }
}

impl fmt::Display for VariableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}:{} ({})", self.name, i, self.unit),
            None => write!(f, "{} ({})", self.name, self.unit),
        }
    }
}

#[derive(Debug, Clone)]
struct TelemetryEntry {
    spec: VariableSpec,
    /// Smallest change epsilon any watcher asked for.
    delta: Option<f64>,
    value: Option<f64>,
}

/// Handle → last value, plus the spec each handle was registered for.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    entries: BTreeMap<Handle, TelemetryEntry>,
    by_spec: HashMap<VariableSpec, Handle>,
    next: u32,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a variable.  Identical specs share a handle.
    pub fn register(&mut self, spec: VariableSpec, delta: Option<f64>) -> Handle {
        if let Some(&handle) = self.by_spec.get(&spec) {
            if let Some(entry) = self.entries.get_mut(&handle) {
                entry.delta = match (entry.delta, delta) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            return handle;
        }

        let handle = Handle(self.next);
        self.next += 1;
        debug!("Telemetry: registered {} as {}", spec, handle);
        self.by_spec.insert(spec.clone(), handle);
        self.entries.insert(
            handle,
            TelemetryEntry {
                spec,
                delta,
                value: None,
            },
        );
        handle
    }

    /// Store a freshly received value.
    pub fn on_value_changed(&mut self, handle: Handle, value: f64) -> Result<(), TelemetryError> {
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(TelemetryError::UnknownHandle(handle))?;
        debug!("Telemetry: {} is now {}", entry.spec, value);
        entry.value = Some(value);
        Ok(())
    }

    /// Last value received for `handle`, if any.
    pub fn value(&self, handle: Handle) -> Option<f64> {
        self.entries.get(&handle).and_then(|e| e.value)
    }

    /// Every registered subscription in handle order, for the transport.
    pub fn subscriptions(&self) -> impl Iterator<Item = (Handle, &VariableSpec, Option<f64>)> + '_ {
        self.entries.iter().map(|(h, e)| (*h, &e.spec, e.delta))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
