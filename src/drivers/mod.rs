//! Controller-side state helpers: buttons, display lines, blink patterns.

pub mod button;
pub mod display;
pub mod led_patterns;
