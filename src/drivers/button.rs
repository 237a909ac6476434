//! Controller button-state vector.
//!
//! The transport reports raw press/release notifications, including
//! auto-repeat presses while a button is held.  This vector keeps the
//! held/released level of every button so the modal resolver can read
//! it at the end of each polling cycle, and classifies each notification
//! as a real edge or a repeat.
//!
//! Buttons are numbered from 1, as in the rule document.

use heapless::Vec;

/// Largest controller the vector can hold.
pub const MAX_BUTTONS: usize = 64;

/// Classification of a raw notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    /// Released → held.
    Pressed,
    /// Held → released.
    Released,
    /// Press while already held (auto-repeat or duplicate).
    Repeat,
    /// Release while already released.
    Spurious,
}

#[derive(Debug, Clone)]
pub struct ButtonStates {
    held: Vec<bool, MAX_BUTTONS>,
}

impl ButtonStates {
    /// `count` is clamped to [`MAX_BUTTONS`].
    pub fn new(count: u8) -> Self {
        let held = core::iter::repeat_n(false, usize::from(count).min(MAX_BUTTONS)).collect();
        Self { held }
    }

    /// Record a press.  `None` if `button` is out of range.
    pub fn press(&mut self, button: u8) -> Option<ButtonEdge> {
        let slot = self.slot_mut(button)?;
        let edge = if *slot {
            ButtonEdge::Repeat
        } else {
            ButtonEdge::Pressed
        };
        *slot = true;
        Some(edge)
    }

    /// Record a release.  `None` if `button` is out of range.
    pub fn release(&mut self, button: u8) -> Option<ButtonEdge> {
        let slot = self.slot_mut(button)?;
        let edge = if *slot {
            ButtonEdge::Released
        } else {
            ButtonEdge::Spurious
        };
        *slot = false;
        Some(edge)
    }

    /// Out-of-range buttons are never held.
    pub fn is_held(&self, button: u8) -> bool {
        usize::from(button)
            .checked_sub(1)
            .and_then(|i| self.held.get(i))
            .copied()
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.held.len()
    }

    fn slot_mut(&mut self, button: u8) -> Option<&mut bool> {
        let i = usize::from(button).checked_sub(1)?;
        self.held.get_mut(i)
    }
}
