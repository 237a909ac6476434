//! Display line cache.
//!
//! The controller's text display has three lines.  Writes go through this
//! cache so a line is only sent when its (truncated) text changes, and so
//! the current text can be replayed when the display is switched back on.
//!
//! Text is treated as opaque; truncation counts `char`s.

use heapless::String;

/// Lines on the display.
pub const DISPLAY_LINES: usize = 3;

/// Byte capacity per cached line (16 chars of up to 4 bytes).
const LINE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct DisplayCache {
    lines: [String<LINE_CAPACITY>; DISPLAY_LINES],
    line_len: usize,
}

impl DisplayCache {
    pub fn new(line_len: usize) -> Self {
        Self {
            lines: Default::default(),
            line_len,
        }
    }

    /// Cache `text` on `line`.  Returns the truncated text when it differs
    /// from what the line already shows, `None` when there is nothing to
    /// send (unchanged or out-of-range line).
    pub fn update(&mut self, line: usize, text: &str) -> Option<&str> {
        let slot = self.lines.get_mut(line)?;
        let truncated = truncate(text, self.line_len);
        if slot.as_str() == truncated {
            return None;
        }
        slot.clear();
        for c in truncated.chars() {
            if slot.push(c).is_err() {
                break;
            }
        }
        Some(slot.as_str())
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
