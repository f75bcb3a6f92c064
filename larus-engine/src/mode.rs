//! Operating modes and their per-instance dispatch tables

use larus_launchpad::{Button, Event, MidiFrame};

use crate::queue::OutputQueue;

/// Handler invoked with the button that triggered an event
pub type Handler<S> = fn(&mut S, Button);

/// Event → handler bindings owned by a single mode instance
///
/// Built once when the mode is constructed. Each mode owns its own events,
/// so the pressed state of one mode is never seen by another.
pub struct DispatchTable<S> {
    bindings: Vec<(Event, Handler<S>)>,
}

impl<S> Default for DispatchTable<S> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<S> DispatchTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding (construction time only)
    pub fn bind(mut self, event: Event, handler: Handler<S>) -> Self {
        self.bindings.push((event, handler));
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.bindings.iter().map(|(event, _)| event)
    }

    /// Run every binding whose event fires on `frame`, in binding order
    ///
    /// Returns the number of handlers called.
    pub fn dispatch(&mut self, frame: &MidiFrame, state: &mut S) -> usize {
        let mut called = 0;
        for (event, handler) in &mut self.bindings {
            if let Some(trigger) = event.process(frame) {
                handler(state, trigger);
                called += 1;
            }
        }
        called
    }

    /// Forget held buttons on every event
    pub fn reset(&mut self) {
        for (event, _) in &mut self.bindings {
            event.reset();
        }
    }
}

/// An operating mode of the controller
///
/// Only the active mode receives frames and audio. Everything here runs on
/// the audio callback thread and must not block or allocate.
pub trait Mode: Send {
    fn name(&self) -> &'static str;

    /// Top row button that activates this mode
    fn select(&self) -> Button;

    /// Dispatch one frame to the mode's handlers; returns handlers called
    fn handle_frame(&mut self, frame: &MidiFrame) -> usize;

    /// Process one block
    ///
    /// `input` is interleaved with [`crate::INPUT_CHANNELS`] channels and
    /// `output` with [`crate::OUTPUT_CHANNELS`]. Lighting for the block must
    /// be queued before returning.
    fn process_audio(&mut self, input: &[f32], output: &mut [f32], queue: &mut OutputQueue);

    /// Called when the mode becomes active
    fn on_activate(&mut self, _queue: &mut OutputQueue) {}
}
