//! Single-producer single-consumer ring of buffer slots
//!
//! The reader task fills slots at logical index `offset + size` while the
//! orchestrator drains the slot at `offset`. A single mutex guards `offset`, `size`,
//! the cancellation flag and the deferred source failure; one condition variable
//! carries every wakeup. With exactly one producer and one consumer only one side
//! can be waiting at any time, so `notify_one` is sufficient.
//!
//! Slot contents live in their own mutexes. A slot is only ever locked by the side
//! that currently owns it, so those locks are never contended.

use crate::buffer::{Buffer, BufferSet};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::any::Any;
use std::io;
use tracing::trace;

/// A failure raised by the source, parked until the orchestrator has drained the
/// ring.
pub(crate) enum SourceFailure {
    /// The source returned an I/O error
    Io(io::Error),
    /// The source panicked; the payload is resumed unchanged
    Defect(Box<dyn Any + Send + 'static>),
}

impl std::fmt::Debug for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => f.debug_tuple("Io").field(error).finish(),
            Self::Defect(_) => f.write_str("Defect(..)"),
        }
    }
}

#[derive(Debug)]
struct RingState {
    /// Index of the oldest unconsumed slot
    offset: usize,
    /// Number of filled, unconsumed slots
    size: usize,
    cancelled: bool,
    failure: Option<SourceFailure>,
}

/// The shared state of one copy operation
#[derive(Debug)]
pub(crate) struct RingBuffer {
    slots: Box<[Mutex<Buffer>]>,
    state: Mutex<RingState>,
    signal: Condvar,
}

impl RingBuffer {
    pub(crate) fn new(set: BufferSet) -> Self {
        debug_assert!(set.len() >= 2, "a ring needs at least two slots");
        Self {
            slots: set.into_buffers().into_iter().map(Mutex::new).collect(),
            state: Mutex::new(RingState {
                offset: 0,
                size: 0,
                cancelled: false,
                failure: None,
            }),
            signal: Condvar::new(),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Wait for a free slot and return its index, or `None` once cancelled
    pub(crate) fn next_writable(&self) -> Option<usize> {
        let depth = self.depth();
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return None;
            }
            if state.size < depth {
                return Some((state.offset + state.size) % depth);
            }
            self.signal.wait(&mut state);
        }
    }

    /// Hand the slot filled last over to the consumer
    pub(crate) fn publish(&self, failure: Option<SourceFailure>) {
        let mut state = self.state.lock();
        if let Some(failure) = failure {
            debug_assert!(state.failure.is_none(), "source failure recorded twice");
            state.failure.get_or_insert(failure);
        }
        state.size += 1;
        trace!(size = state.size, "slot published");
        // only the consumer could be waiting now
        self.signal.notify_one();
    }

    /// Wait for the oldest filled slot and return its index
    pub(crate) fn next_readable(&self) -> usize {
        let mut state = self.state.lock();
        while state.size == 0 {
            self.signal.wait(&mut state);
        }
        state.offset
    }

    /// Release the oldest filled slot back to the producer
    pub(crate) fn consume(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.size > 0, "consumed an empty ring");
        state.offset = (state.offset + 1) % self.depth();
        state.size -= 1;
        trace!(size = state.size, "slot consumed");
        // only the producer could be waiting now
        self.signal.notify_one();
    }

    /// Ask the producer to stop at its next slot acquisition
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.signal.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Take the parked source failure, if any
    pub(crate) fn take_failure(&self) -> Option<SourceFailure> {
        self.state.lock().failure.take()
    }

    pub(crate) fn slot(&self, index: usize) -> MutexGuard<'_, Buffer> {
        self.slots[index].lock()
    }

    /// Recover the buffer set once both sides are done with it
    pub(crate) fn take_buffer_set(&mut self) -> BufferSet {
        BufferSet::from_buffers(
            std::mem::take(&mut self.slots)
                .into_vec()
                .into_iter()
                .map(Mutex::into_inner)
                .collect(),
        )
    }
}
