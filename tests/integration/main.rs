//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem against
//! the mock adapters in `mock_hw`.  No controller or simulator needed.

mod bindings_tests;
mod engine_tests;
mod scheduler_tests;
