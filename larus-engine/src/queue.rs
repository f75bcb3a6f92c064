//! Bounded queue of messages for the controller
//!
//! Filled by the active mode during a block and emptied into the controller
//! output before the block ends. Storage is allocated once; when full, the
//! oldest message is overwritten.

use larus_launchpad::{LedMessage, MidiFrame};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use crate::error::EngineError;

/// Destination for encoded controller frames
pub trait ControllerSink {
    /// Write one frame; `offset` is its position within the current block
    fn send(&mut self, offset: u32, frame: MidiFrame);
}

impl ControllerSink for Vec<MidiFrame> {
    fn send(&mut self, _offset: u32, frame: MidiFrame) {
        self.push(frame);
    }
}

/// Drop-oldest FIFO of pending controller messages
pub struct OutputQueue {
    buffer: HeapRb<LedMessage>,
    dropped: u64,
}

impl OutputQueue {
    /// Room for three full surface refreshes
    pub const DEFAULT_CAPACITY: usize = 128;

    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidCapacity);
        }
        Ok(Self {
            buffer: HeapRb::new(capacity),
            dropped: 0,
        })
    }

    /// Queue a message, overwriting the oldest one if the queue is full
    pub fn push(&mut self, message: LedMessage) {
        if self.buffer.push_overwrite(message).is_some() {
            self.dropped += 1;
        }
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = LedMessage>) {
        for message in messages {
            self.push(message);
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity().get()
    }

    /// Messages overwritten since the queue was created
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Encode and send everything, oldest first; returns the number sent
    pub fn drain(&mut self, sink: &mut impl ControllerSink) -> usize {
        let mut sent = 0u32;
        while let Some(message) = self.buffer.try_pop() {
            sink.send(sent, message.encode());
            sent += 1;
        }
        sent as usize
    }

    /// Discard pending messages without sending them
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
