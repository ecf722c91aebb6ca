//! Elastic buffer and the streaming FIFO bridge built on it.
//!
//! [`ElasticBuffer`] is a fixed-capacity ring with free-running read and
//! write pointers; occupancy is their wrapping difference. Slot positions are
//! tracked separately, modulo the capacity, so any depth up to
//! [`MAX_CAPACITY`] works. Only the writer advances the write side and only
//! the reader advances the read side.
//!
//! [`StreamBridge`] puts a ready/valid interface on each side. Both
//! handshake signals are derived from the occupancy before the clock edge,
//! so `ready` deasserts exactly at `occupancy == capacity` and `valid`
//! exactly at `occupancy == 0`.

use serde::Serialize;

use crate::error::SimError;
use crate::stream::StreamFrame;

/// Largest supported capacity.
pub const MAX_CAPACITY: u32 = 1 << 20;

/// Returned by [`ElasticBuffer::push`] when the buffer is full. Carries the
/// rejected item back to the caller.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("elastic buffer is full")]
pub struct PushError<T>(pub T);

/// Fixed-capacity FIFO ring.
#[derive(Debug, Clone)]
pub struct ElasticBuffer<T> {
    slots: Vec<Option<T>>,
    write_ptr: u64,
    read_ptr: u64,
    write_slot: usize,
    read_slot: usize,
}

impl<T> ElasticBuffer<T> {
    /// Creates an empty buffer. `capacity` must be in `1..=MAX_CAPACITY`.
    pub fn new(capacity: u32) -> Result<Self, SimError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(SimError::InvalidCapacity(capacity));
        }
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.resize_with(capacity as usize, || None);
        Ok(Self {
            slots,
            write_ptr: 0,
            read_ptr: 0,
            write_slot: 0,
            read_slot: 0,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Frames currently stored, `write_ptr - read_ptr`.
    pub fn occupancy(&self) -> usize {
        self.write_ptr.wrapping_sub(self.read_ptr) as usize
    }

    /// Whether no frame is stored.
    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    /// Whether every slot is used.
    pub fn is_full(&self) -> bool {
        self.occupancy() == self.capacity()
    }

    /// Free-running write pointer.
    pub fn write_ptr(&self) -> u64 {
        self.write_ptr
    }

    /// Free-running read pointer.
    pub fn read_ptr(&self) -> u64 {
        self.read_ptr
    }

    /// Appends an item. A full buffer refuses the write and leaves its
    /// pointers untouched.
    pub fn push(&mut self, item: T) -> Result<(), PushError<T>> {
        if self.is_full() {
            return Err(PushError(item));
        }
        self.slots[self.write_slot] = Some(item);
        self.write_slot = self.next_slot(self.write_slot);
        self.write_ptr = self.write_ptr.wrapping_add(1);
        Ok(())
    }

    /// Removes the oldest item. An empty buffer returns `None` and leaves
    /// its pointers untouched.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.read_slot].take();
        self.read_slot = self.next_slot(self.read_slot);
        self.read_ptr = self.read_ptr.wrapping_add(1);
        item
    }

    /// The oldest item, if any.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.read_slot].as_ref()
    }

    /// Drops every item and rewinds both pointers.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.write_ptr = 0;
        self.read_ptr = 0;
        self.write_slot = 0;
        self.read_slot = 0;
    }

    fn next_slot(&self, slot: usize) -> usize {
        if slot + 1 == self.slots.len() {
            0
        } else {
            slot + 1
        }
    }
}

/// Traffic counters for a bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Frames accepted on the producer side.
    pub frames_in: u64,
    /// Frames delivered on the consumer side.
    pub frames_out: u64,
    /// Highest occupancy observed.
    pub peak_occupancy: usize,
}

/// What moved across the bridge on one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    /// The producer's frame was accepted.
    pub accepted: bool,
    /// The frame handed to the consumer.
    pub delivered: Option<StreamFrame>,
}

/// Synchronous FIFO with ready/valid on both sides.
#[derive(Debug, Clone)]
pub struct StreamBridge {
    buffer: ElasticBuffer<StreamFrame>,
    width: u32,
    stats: BridgeStats,
}

impl StreamBridge {
    /// Creates an empty bridge for `width`-bit words.
    pub fn new(width: u32, capacity: u32) -> Result<Self, SimError> {
        if width == 0 || width > 64 {
            return Err(SimError::InvalidWidth(width));
        }
        Ok(Self {
            buffer: ElasticBuffer::new(capacity)?,
            width,
            stats: BridgeStats::default(),
        })
    }

    /// Producer-side `ready`: space remains.
    pub fn sink_ready(&self) -> bool {
        !self.buffer.is_full()
    }

    /// Consumer-side `valid` and payload: the head frame, if any.
    pub fn source(&self) -> Option<StreamFrame> {
        self.buffer.peek().copied()
    }

    /// Advances one edge. `sink` is the producer's offer, `source_ready` the
    /// consumer's `ready`. Handshakes use the state before the edge.
    pub fn clock(&mut self, sink: Option<StreamFrame>, source_ready: bool) -> Transfer {
        let ready = self.sink_ready();
        let mut transfer = Transfer::default();

        if source_ready {
            transfer.delivered = self.buffer.pop();
            if transfer.delivered.is_some() {
                self.stats.frames_out += 1;
            }
        }

        if let (true, Some(mut frame)) = (ready, sink) {
            frame.payload &= self.word_mask();
            match self.buffer.push(frame) {
                Ok(()) => {
                    transfer.accepted = true;
                    self.stats.frames_in += 1;
                }
                Err(PushError(dropped)) => {
                    tracing::error!(?dropped, "write refused by a full elastic buffer");
                }
            }
        }

        self.stats.peak_occupancy = self.stats.peak_occupancy.max(self.buffer.occupancy());
        transfer
    }

    /// Empties the buffer; counters are kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Frames currently buffered.
    pub fn occupancy(&self) -> usize {
        self.buffer.occupancy()
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Word width in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Traffic counters.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    fn word_mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }
}
