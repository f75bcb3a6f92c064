//! Semantic events matched from raw controller frames
//!
//! The controller reports a button as two independent messages (on, then
//! off). [`Press`] pairs them into a single press-and-release, while a
//! [`Event::Target`] fires as soon as a button goes down.

use crate::button::{Button, Buttons};
use crate::protocol::MidiFrame;

/// Press-and-release of any button in a target
///
/// Every button of the target has its own pressed flag, so two pads held
/// at once are tracked independently. A flag only ever moves
/// `false -> true -> false`; the event fires on the second transition.
#[derive(Debug, Clone)]
pub struct Press {
    target: Buttons,
    /// One bit per `Button::index()`
    pressed: u128,
    trigger: Option<Button>,
}

impl Press {
    pub fn new(target: impl Into<Buttons>) -> Self {
        Self {
            target: target.into(),
            pressed: 0,
            trigger: None,
        }
    }

    pub fn target(&self) -> &Buttons {
        &self.target
    }

    /// Button of the most recent on or off seen by this event
    pub fn trigger(&self) -> Option<Button> {
        self.trigger
    }

    pub fn is_pressed(&self, button: &Button) -> bool {
        self.pressed & Self::bit(button) != 0
    }

    /// Any button of the target is currently held
    pub fn is_held(&self) -> bool {
        self.pressed != 0
    }

    /// Feed one frame; returns the released button when the event fires
    pub fn process(&mut self, frame: &MidiFrame) -> Option<Button> {
        if let Some(button) = self.target.note_on(frame) {
            self.pressed |= Self::bit(&button);
            self.trigger = Some(button);
            return None;
        }

        match self.target.note_off(frame) {
            Some(button) if self.is_pressed(&button) => {
                self.pressed &= !Self::bit(&button);
                self.trigger = Some(button);
                Some(button)
            }
            _ => None,
        }
    }

    /// Forget held buttons (e.g. when the owning mode is re-activated)
    pub fn reset(&mut self) {
        self.pressed = 0;
    }

    #[inline]
    fn bit(button: &Button) -> u128 {
        1u128 << button.index()
    }
}

/// A matcher bound to a handler in a mode's dispatch table
#[derive(Debug, Clone)]
pub enum Event {
    /// Fires on release after a matching press
    Press(Press),
    /// Fires immediately on a note-on of any target button
    Target(Buttons),
}

impl Event {
    pub fn press(target: impl Into<Buttons>) -> Self {
        Event::Press(Press::new(target))
    }

    pub fn target(target: impl Into<Buttons>) -> Self {
        Event::Target(target.into())
    }

    /// Match a raw message
    ///
    /// Malformed messages never match.
    pub fn match_bytes(&mut self, bytes: &[u8]) -> Option<Button> {
        MidiFrame::decode(bytes).and_then(|frame| self.process(&frame))
    }

    /// Match a decoded frame; returns the trigger button when the event fires
    pub fn process(&mut self, frame: &MidiFrame) -> Option<Button> {
        match self {
            Event::Press(press) => press.process(frame),
            Event::Target(target) => {
                if !target.matches(frame) || !frame.is_on() {
                    return None;
                }
                match target.get_event(frame) {
                    Ok(button) => Some(button),
                    // `matches` and `get_event` walk the same buttons
                    Err(err) => panic!("matcher disagreement: {}", err),
                }
            }
        }
    }

    /// Drop any held state
    pub fn reset(&mut self) {
        if let Event::Press(press) = self {
            press.reset();
        }
    }
}
