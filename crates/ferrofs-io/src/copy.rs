//! Pipelined stream copy engine
//!
//! A copy runs on two threads. A pooled reader thread fills a small ring of buffers
//! from the source while the calling thread drains it into the sink. This hides the
//! latency of slow or bursty media such as network shares, and it keeps error
//! attribution exact: sink failures surface immediately on the calling thread,
//! source failures are parked by the reader and reported once the ring is drained.

use crate::buffer::BufferPool;
use crate::reader::{ReaderStats, ReaderTask};
use crate::ring::{RingBuffer, SourceFailure};
use crate::worker::{TaskHandle, WorkerPool};
use ferrofs_types::{CopyStats, EngineConfig, Error, Result, Sink, Source};
use once_cell::sync::OnceCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

static GLOBAL: OnceCell<StreamEngine> = OnceCell::new();

/// Stream copy engine owning a buffer pool and a reader thread pool.
///
/// Engines are cheap to share by reference and safe to use from any number of
/// threads at once. Concurrent copies only meet in the lock-free buffer pool.
#[derive(Debug)]
pub struct StreamEngine {
    config: EngineConfig,
    buffer_pool: BufferPool,
    worker_pool: WorkerPool,
}

impl StreamEngine {
    /// Create a new engine with the given settings
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Create a new engine with a shared worker pool
    pub fn with_worker_pool(config: EngineConfig, worker_pool: WorkerPool) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            buffer_pool: BufferPool::from_config(&config),
            worker_pool,
            config,
        })
    }

    fn from_valid(config: EngineConfig) -> Self {
        Self {
            buffer_pool: BufferPool::from_config(&config),
            worker_pool: WorkerPool::from_config(&config),
            config,
        }
    }

    /// The process-wide engine, created with default settings on first use
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::from_valid(EngineConfig::default()))
    }

    /// Create the process-wide engine with custom settings.
    ///
    /// This must happen before anything calls [`StreamEngine::global`]; settings
    /// cannot change once the engine exists.
    pub fn install_global(config: EngineConfig) -> Result<&'static Self> {
        let mut installed = false;
        let engine = GLOBAL.get_or_try_init(|| {
            installed = true;
            Self::new(config)
        })?;
        if !installed {
            return Err(Error::config("global stream engine is already initialized"));
        }
        Ok(engine)
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The pool of idle buffer sets
    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// The pool of reader threads
    pub fn worker_pool(&self) -> &WorkerPool {
        &self.worker_pool
    }

    /// Copy everything from `source` to `sink` without closing either.
    ///
    /// The sink is flushed unless writing to it failed, even when the source failed
    /// part way through. Source failures are returned as [`Error::Source`] and sink
    /// failures as [`Error::Sink`] carrying the sink's error unmodified. If the
    /// source panics, the panic is resumed on the calling thread with its original
    /// payload once the sink was flushed.
    ///
    /// When this returns, by value or by unwinding, the reader thread has stopped
    /// touching `source`.
    pub fn cat<S, K>(&self, source: &mut S, sink: &mut K) -> Result<CopyStats>
    where
        S: Source + Send + ?Sized,
        K: Sink + ?Sized,
    {
        let start = Instant::now();
        let ring = Arc::new(RingBuffer::new(self.buffer_pool.allocate()));
        let reader_stats = Arc::new(ReaderStats::default());
        let task = ReaderTask::new(source, Arc::clone(&ring), Arc::clone(&reader_stats));

        // SAFETY: the handle is owned by `operation`, whose drop joins the reader
        // on every exit from this function, including unwinding.
        let reader = unsafe { self.worker_pool.spawn_scoped(move || task.run()) };
        let mut operation = CopyOperation {
            buffer_pool: &self.buffer_pool,
            ring,
            reader: None,
        };
        operation.reader = Some(reader?);

        debug!(depth = operation.ring.depth(), "stream copy started");
        let mut stats = operation.drain(sink)?;
        operation.join_reader();

        sink.flush().map_err(Error::sink_failure)?;

        stats.zero_length_reads = reader_stats.zero_length_reads();
        stats.duration = start.elapsed();

        match operation.ring.take_failure() {
            None => {
                debug!(
                    bytes = stats.bytes_copied,
                    chunks = stats.chunks_written,
                    reads = reader_stats.reads(),
                    "stream copy finished in {:?}",
                    stats.duration
                );
                Ok(stats)
            }
            Some(SourceFailure::Io(error)) => {
                warn!(bytes = stats.bytes_copied, "source failed: {}", error);
                Err(Error::source_failure(error))
            }
            Some(SourceFailure::Defect(payload)) => {
                warn!(bytes = stats.bytes_copied, "source panicked, resuming panic");
                panic::resume_unwind(payload)
            }
        }
    }

    /// Copy everything from `source` to `sink`, then close both, whatever happened.
    ///
    /// A failure to close the sink takes precedence over a failure to close the
    /// source, which in turn takes precedence over a failure of the copy itself.
    /// Successful closes never hide a copy failure. A panic during the copy is
    /// resumed after both endpoints were closed.
    pub fn copy<S, K>(&self, mut source: S, mut sink: K) -> Result<CopyStats>
    where
        S: Source + Send,
        K: Sink,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.cat(&mut source, &mut sink)));
        let source_closed = source.close();
        let sink_closed = sink.close();

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                if let Err(error) = source_closed {
                    warn!("discarding source close error during panic: {}", error);
                }
                if let Err(error) = sink_closed {
                    warn!("discarding sink close error during panic: {}", error);
                }
                panic::resume_unwind(payload)
            }
        };

        if let Err(error) = sink_closed {
            if let Err(superseded) = &result {
                debug!("sink close error supersedes: {}", superseded);
            }
            if let Err(superseded) = &source_closed {
                debug!("sink close error supersedes source close error: {}", superseded);
            }
            return Err(Error::sink_failure(error));
        }
        if let Err(error) = source_closed {
            if let Err(superseded) = &result {
                debug!("source close error supersedes: {}", superseded);
            }
            return Err(Error::source_failure(error));
        }
        result
    }
}

impl Default for StreamEngine {
    fn default() -> Self {
        Self::from_valid(EngineConfig::default())
    }
}

/// One in-flight copy: the ring shared with the reader, and the reader itself.
///
/// Dropping the operation cancels and joins a reader that is still running, then
/// hands the buffer set back to the pool. Nothing can release the buffers while a
/// reader might still write into them.
struct CopyOperation<'e> {
    buffer_pool: &'e BufferPool,
    ring: Arc<RingBuffer>,
    reader: Option<TaskHandle>,
}

impl CopyOperation<'_> {
    /// Write filled slots to the sink until the terminal slot shows up
    fn drain<K: Sink + ?Sized>(&mut self, sink: &mut K) -> Result<CopyStats> {
        let mut stats = CopyStats::new();
        loop {
            let index = self.ring.next_readable();
            let slot = self.ring.slot(index);
            if slot.is_terminal() {
                return Ok(stats);
            }

            let payload = slot.payload();
            if !payload.is_empty() {
                if let Err(error) = sink.write_chunk(payload) {
                    drop(slot);
                    warn!(bytes = stats.bytes_copied, "sink failed, cancelling reader: {}", error);
                    self.cancel_reader();
                    return Err(Error::sink_failure(error));
                }
                stats.bytes_copied += payload.len() as u64;
                stats.chunks_written += 1;
            }
            drop(slot);
            self.ring.consume();
        }
    }

    /// Wait for a reader that already published its terminal slot
    fn join_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.join();
        }
    }

    /// Stop the reader and wait until it has observably terminated.
    ///
    /// A reader that finished on its own just before is a successful cancellation
    /// too.
    fn cancel_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.ring.cancel();
            reader.join();
            debug!("reader cancelled");
        }
    }
}

impl Drop for CopyOperation<'_> {
    fn drop(&mut self) {
        self.cancel_reader();
        // the reader task drops its ring handle before its completion is signalled
        let ring = Arc::get_mut(&mut self.ring);
        debug_assert!(ring.is_some(), "reader joined but ring still shared");
        if let Some(ring) = ring {
            self.buffer_pool.release(ring.take_buffer_set());
        }
    }
}
