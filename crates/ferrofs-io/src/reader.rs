//! Background reader task filling ring buffer slots from a source

use crate::ring::{RingBuffer, SourceFailure};
use ferrofs_types::Source;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Counters the reader shares with the orchestrator
#[derive(Debug, Default)]
pub(crate) struct ReaderStats {
    reads: AtomicU64,
    zero_length_reads: AtomicU64,
}

impl ReaderStats {
    pub(crate) fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub(crate) fn zero_length_reads(&self) -> u64 {
        self.zero_length_reads.load(Ordering::Relaxed)
    }
}

/// Producer half of a copy operation
pub(crate) struct ReaderTask<'a, S: ?Sized> {
    source: &'a mut S,
    ring: Arc<RingBuffer>,
    stats: Arc<ReaderStats>,
}

impl<'a, S: Source + ?Sized> ReaderTask<'a, S> {
    pub(crate) fn new(source: &'a mut S, ring: Arc<RingBuffer>, stats: Arc<ReaderStats>) -> Self {
        Self {
            source,
            ring,
            stats,
        }
    }

    /// Fill slots until the source ends, fails or the task gets cancelled.
    ///
    /// Each slot gets exactly one read. Short reads, including empty ones, are
    /// published as they are. A failed read is never retried: it is parked in the
    /// ring and published as a terminal slot.
    pub(crate) fn run(self) {
        let Self {
            source,
            ring,
            stats,
        } = self;

        loop {
            let Some(index) = ring.next_writable() else {
                trace!("reader cancelled");
                return;
            };

            let mut slot = ring.slot(index);
            let capacity = slot.capacity();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                source.read_chunk(slot.region_mut())
            }));
            stats.reads.fetch_add(1, Ordering::Relaxed);

            let failure = match outcome {
                Ok(Ok(Some(len))) if len <= capacity => {
                    if len == 0 {
                        stats.zero_length_reads.fetch_add(1, Ordering::Relaxed);
                    }
                    slot.set_filled(len);
                    None
                }
                Ok(Ok(Some(len))) => {
                    slot.mark_terminal();
                    Some(SourceFailure::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("source reported {len} bytes read into a {capacity} byte buffer"),
                    )))
                }
                Ok(Ok(None)) => {
                    slot.mark_terminal();
                    None
                }
                Ok(Err(error)) => {
                    slot.mark_terminal();
                    Some(SourceFailure::Io(error))
                }
                Err(payload) => {
                    slot.mark_terminal();
                    Some(SourceFailure::Defect(payload))
                }
            };

            let terminal = slot.is_terminal();
            drop(slot);
            ring.publish(failure);
            if terminal {
                trace!(reads = stats.reads(), "reader reached end of source");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSet;

    struct Scripted(Vec<io::Result<Option<Vec<u8>>>>);

    impl Source for Scripted {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
            match self.0.remove(0)? {
                Some(bytes) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Some(bytes.len()))
                }
                None => Ok(None),
            }
        }
    }

    fn run(script: Vec<io::Result<Option<Vec<u8>>>>, depth: usize) -> (Arc<RingBuffer>, Arc<ReaderStats>) {
        let ring = Arc::new(RingBuffer::new(BufferSet::new(depth, 8)));
        let stats = Arc::new(ReaderStats::default());
        let mut source = Scripted(script);
        ReaderTask::new(&mut source, Arc::clone(&ring), Arc::clone(&stats)).run();
        (ring, stats)
    }

    #[test]
    fn test_publishes_each_read_then_terminal() {
        let (ring, stats) = run(
            vec![Ok(Some(b"ab".to_vec())), Ok(Some(Vec::new())), Ok(None)],
            4,
        );

        assert_eq!(stats.reads(), 3);
        assert_eq!(stats.zero_length_reads(), 1);
        assert_eq!(ring.slot(0).payload(), b"ab");
        assert_eq!(ring.slot(1).filled(), Some(0));
        assert!(ring.slot(2).is_terminal());
        assert!(ring.take_failure().is_none());
    }

    #[test]
    fn test_failure_is_parked_not_raised() {
        let (ring, stats) = run(
            vec![Ok(Some(b"x".to_vec())), Err(io::Error::other("bad sector"))],
            2,
        );

        assert_eq!(stats.reads(), 2);
        assert!(ring.slot(1).is_terminal());
        match ring.take_failure() {
            Some(SourceFailure::Io(error)) => assert_eq!(error.to_string(), "bad sector"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_overlong_read_is_a_source_failure() {
        struct Liar;
        impl Source for Liar {
            fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
                Ok(Some(usize::MAX))
            }
        }

        let ring = Arc::new(RingBuffer::new(BufferSet::new(2, 8)));
        ReaderTask::new(&mut Liar, Arc::clone(&ring), Arc::default()).run();
        match ring.take_failure() {
            Some(SourceFailure::Io(error)) => assert_eq!(error.kind(), io::ErrorKind::InvalidData),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_reader_does_not_read() {
        struct Untouchable;
        impl Source for Untouchable {
            fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
                panic!("read after cancellation");
            }
        }

        let ring = Arc::new(RingBuffer::new(BufferSet::new(2, 8)));
        let stats = Arc::new(ReaderStats::default());
        ring.cancel();
        ReaderTask::new(&mut Untouchable, Arc::clone(&ring), Arc::clone(&stats)).run();
        assert_eq!(stats.reads(), 0);
    }
}
