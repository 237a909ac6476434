//! Fuzz target: `InputCommand` text parser
//!
//! cargo fuzz run fuzz_input_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use x52out::app::commands::InputCommand;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // Either outcome is fine; the parser must simply never panic.
        let _ = line.parse::<InputCommand>();
    }
});
