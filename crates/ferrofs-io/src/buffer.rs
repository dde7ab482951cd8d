//! Pooled buffer sets for the stream copy engine
//!
//! Every copy needs one [`BufferSet`]: a fixed number of fixed-capacity buffers that
//! back its ring buffer. Allocating those for each small archive entry would
//! dominate the cost of the copy, so idle sets are parked in a [`BufferPool`] and
//! handed out again. Pooling is purely an optimization: a pool that never returns
//! anything yields exactly the same copies.

use bytes::BytesMut;
use crossbeam_queue::ArrayQueue;
use ferrofs_types::EngineConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// A fixed-capacity byte region plus the outcome of the read that filled it
#[derive(Debug)]
pub struct Buffer {
    data: BytesMut,
    /// `None` marks a terminal slot: the source ended or failed.
    filled: Option<usize>,
}

impl Buffer {
    /// Create a zeroed buffer of the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::zeroed(capacity),
            filled: Some(0),
        }
    }

    /// Capacity of the byte region
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The whole byte region, for the reader to fill
    pub fn region_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Number of bytes the last read put into this buffer, or `None` for a
    /// terminal slot
    pub fn filled(&self) -> Option<usize> {
        self.filled
    }

    /// Check if this buffer marks the end of the source
    pub fn is_terminal(&self) -> bool {
        self.filled.is_none()
    }

    /// The bytes delivered by the last read
    pub fn payload(&self) -> &[u8] {
        match self.filled {
            Some(len) => &self.data[..len],
            None => &[],
        }
    }

    pub(crate) fn set_filled(&mut self, len: usize) {
        debug_assert!(len <= self.capacity());
        self.filled = Some(len);
    }

    pub(crate) fn mark_terminal(&mut self) {
        self.filled = None;
    }

    fn reset(&mut self) {
        self.filled = Some(0);
    }
}

/// The buffers backing one ring buffer; the unit of pooling
#[derive(Debug)]
pub struct BufferSet {
    buffers: Vec<Buffer>,
}

impl BufferSet {
    /// Allocate `depth` fresh buffers of `capacity` bytes each
    pub fn new(depth: usize, capacity: usize) -> Self {
        Self {
            buffers: (0..depth).map(|_| Buffer::new(capacity)).collect(),
        }
    }

    /// Number of buffers in the set
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Check if the set holds no buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Capacity of each buffer in the set
    pub fn buffer_capacity(&self) -> usize {
        self.buffers.first().map_or(0, Buffer::capacity)
    }

    /// Iterate over the buffers
    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    pub(crate) fn into_buffers(self) -> Vec<Buffer> {
        self.buffers
    }

    pub(crate) fn from_buffers(buffers: Vec<Buffer>) -> Self {
        Self { buffers }
    }

    fn matches(&self, depth: usize, capacity: usize) -> bool {
        self.len() == depth && self.buffers.iter().all(|buffer| buffer.capacity() == capacity)
    }

    fn reset(&mut self) {
        self.buffers.iter_mut().for_each(Buffer::reset);
    }
}

/// Lock-free cache of idle buffer sets.
///
/// The pool holds at most `capacity` sets; releasing into a full pool drops the set.
/// Sets in flight are never owned by the pool.
#[derive(Debug)]
pub struct BufferPool {
    idle: Option<ArrayQueue<BufferSet>>,
    depth: usize,
    buffer_capacity: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl BufferPool {
    /// Create a new buffer pool.
    ///
    /// A `capacity` of zero disables pooling: every allocation is fresh.
    pub fn new(depth: usize, buffer_capacity: usize, capacity: usize) -> Self {
        Self {
            idle: (capacity > 0).then(|| ArrayQueue::new(capacity)),
            depth,
            buffer_capacity,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Create a buffer pool shaped by the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.fifo_depth.get(),
            config.buffer_capacity.get(),
            config.pool_capacity,
        )
    }

    /// Get an idle buffer set or allocate a new one
    pub fn allocate(&self) -> BufferSet {
        if let Some(mut set) = self.idle.as_ref().and_then(ArrayQueue::pop) {
            self.reused.fetch_add(1, Ordering::Relaxed);
            set.reset();
            return set;
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        trace!(
            depth = self.depth,
            capacity = self.buffer_capacity,
            "allocating buffer set"
        );
        BufferSet::new(self.depth, self.buffer_capacity)
    }

    /// Offer a buffer set back to the pool.
    ///
    /// Sets of a different shape, and sets that do not fit, are dropped.
    pub fn release(&self, set: BufferSet) {
        if !set.matches(self.depth, self.buffer_capacity) {
            trace!("dropping foreign buffer set");
            return;
        }
        if let Some(idle) = &self.idle {
            if idle.push(set).is_err() {
                trace!("buffer pool full, dropping buffer set");
            }
        }
    }

    /// Number of idle sets currently pooled
    pub fn idle_count(&self) -> usize {
        self.idle.as_ref().map_or(0, ArrayQueue::len)
    }

    /// Maximum number of idle sets the pool keeps
    pub fn capacity(&self) -> usize {
        self.idle.as_ref().map_or(0, ArrayQueue::capacity)
    }

    /// Number of sets allocated from scratch so far
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Number of allocations served from the pool so far
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// Drop all idle sets, returning their memory to the allocator
    pub fn clear(&self) {
        if let Some(idle) = &self.idle {
            while idle.pop().is_some() {}
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_buffer_payload() {
        let mut buffer = Buffer::new(16);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.filled(), Some(0));
        assert!(buffer.payload().is_empty());

        buffer.region_mut()[..3].copy_from_slice(b"abc");
        buffer.set_filled(3);
        assert_eq!(buffer.payload(), b"abc");

        buffer.mark_terminal();
        assert!(buffer.is_terminal());
        assert!(buffer.payload().is_empty());
    }

    #[test]
    fn test_buffer_set_shape() {
        let set = BufferSet::new(4, 1024);
        assert_eq!(set.len(), 4);
        assert_eq!(set.buffer_capacity(), 1024);
        assert!(set.iter().all(|buffer| buffer.filled() == Some(0)));
    }

    #[test]
    fn test_buffer_pool_reuse() {
        let pool = BufferPool::new(4, 1024, 2);

        let set1 = pool.allocate();
        let set2 = pool.allocate();
        assert_eq!(pool.allocated(), 2);

        pool.release(set1);
        assert_eq!(pool.idle_count(), 1);
        pool.release(set2);
        assert_eq!(pool.idle_count(), 2);

        let _set = pool.allocate();
        assert_eq!(pool.reused(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_buffer_pool_drops_overflow() {
        let pool = BufferPool::new(2, 64, 1);
        pool.release(pool.allocate());
        pool.release(BufferSet::new(2, 64));
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_buffer_pool_resets_terminal_slots() {
        let pool = BufferPool::new(2, 64, 1);
        let mut buffers = pool.allocate().into_buffers();
        buffers[1].mark_terminal();
        pool.release(BufferSet::from_buffers(buffers));

        let set = pool.allocate();
        assert!(set.iter().all(|buffer| !buffer.is_terminal()));
    }

    #[rstest]
    #[case(2, 1024)]
    #[case(4, 512)]
    #[case(8, 2048)]
    fn test_buffer_pool_rejects_foreign_sets(#[case] depth: usize, #[case] capacity: usize) {
        let pool = BufferPool::new(4, 1024, 4);
        pool.release(BufferSet::new(depth, capacity));
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_disabled_pool_always_allocates() {
        let pool = BufferPool::new(2, 64, 0);
        assert_eq!(pool.capacity(), 0);
        pool.release(pool.allocate());
        let _set = pool.allocate();
        assert_eq!(pool.allocated(), 2);
        assert_eq!(pool.reused(), 0);
    }

    #[test]
    fn test_clear() {
        let pool = BufferPool::new(2, 64, 4);
        pool.release(pool.allocate());
        pool.release(BufferSet::new(2, 64));
        pool.clear();
        assert_eq!(pool.idle_count(), 0);
    }
}
