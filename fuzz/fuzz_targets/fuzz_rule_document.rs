//! Fuzz target: rule document loading and evaluation
//!
//! Feeds arbitrary bytes through `RuleDocument::from_json`, validation and
//! a full evaluation against a value source that answers every state with
//! a value derived from the input.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Every indicator with an id resolves to exactly one light
//!
//! cargo fuzz run fuzz_rule_document

#![no_main]

use libfuzzer_sys::fuzz_target;
use x52out::config::EngineConfig;
use x52out::document::{NodeId, RuleDocument, StateRule};
use x52out::error::RuleError;
use x52out::evaluator::{ValueSource, evaluate};

struct Constant(f64);

impl ValueSource for Constant {
    fn state_value(&self, _node: NodeId, _rule: &StateRule) -> Result<Option<f64>, RuleError> {
        Ok(Some(self.0))
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(doc) = RuleDocument::from_json(text) else {
        return;
    };
    let _ = doc.validate(&EngineConfig::default());

    let value = f64::from(data.len() as u32 % 256);
    let result = evaluate(doc.indicators(), &Constant(value));
    let valid = doc.indicator_ids().filter(|id| !id.is_empty()).count();
    assert_eq!(result.resolutions.len(), valid);
});
