//! Blink pattern symbols and tick arithmetic.
//!
//! A pattern is a string of symbols, one per tick.  The render loop maps
//! each symbol to an indicator state and pushes it to the output port.
//!
//! | Symbol | State   |
//! |--------|---------|
//! | ` `    | `off`   |
//! | `a`    | `amber` |
//! | `g`    | `green` |
//! | `r`    | `red`   |
//! | `o`    | `on`    |
//!
//! Any other symbol leaves the indicator untouched for that tick.
//!
//! Tick positions are always derived from absolute elapsed time, never
//! accumulated, so a late or jittery wake-up cannot drift the animation.

use core::time::Duration;

/// Indicator state understood by the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    Off,
    On,
    Amber,
    Green,
    Red,
}

impl LightState {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            ' ' => Some(Self::Off),
            'o' => Some(Self::On),
            'a' => Some(Self::Amber),
            'g' => Some(Self::Green),
            'r' => Some(Self::Red),
            _ => None,
        }
    }

    /// Name passed to [`OutputPort::set_indicator`](crate::app::ports::OutputPort::set_indicator).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Amber => "amber",
            Self::Green => "green",
            Self::Red => "red",
        }
    }
}

/// Duration of one tick at `speed` ticks per second.
///
/// `None` when the speed is not positive or the tick does not fit in a
/// [`Duration`].
pub fn tick_duration(speed: f64) -> Option<Duration> {
    if !(speed.is_finite() && speed > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / speed).ok()
}

/// `floor(elapsed / tick)`.  A zero tick yields 0 rather than dividing by zero.
pub fn tick_index(elapsed: Duration, tick: Duration) -> u64 {
    let tick_ns = tick.as_nanos();
    if tick_ns == 0 {
        return 0;
    }
    (elapsed.as_nanos() / tick_ns) as u64
}

/// Where a pattern stands at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Show the symbol at this position.
    At(usize),
    /// A finite loop count has been exhausted.
    Frozen,
}

/// Position within a pattern of `len` symbols looped `loop_count` times
/// (0 = forever).
pub fn frame_at(tick: u64, len: usize, loop_count: u32) -> Frame {
    if len == 0 {
        return Frame::Frozen;
    }
    let len = len as u64;
    let cycles = tick / len;
    if loop_count != 0 && cycles >= u64::from(loop_count) {
        return Frame::Frozen;
    }
    Frame::At((tick % len) as usize)
}
