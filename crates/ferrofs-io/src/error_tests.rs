//! Error attribution and cancellation tests for ferrofs-io

use crate::copy::StreamEngine;
use crate::stream::ReadSource;
use ferrofs_types::{EngineConfig, Error, ErrorKind, Sink, Source};
use std::io::{self, Cursor};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn engine() -> StreamEngine {
    StreamEngine::new(EngineConfig::new(16, 2).unwrap()).unwrap()
}

/// Source delivering `data` in 16 byte reads, then failing
struct FailingSource {
    data: Vec<u8>,
    position: usize,
    reads: Arc<AtomicUsize>,
}

impl FailingSource {
    fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            position: 0,
            reads: Arc::default(),
        }
    }
}

impl Source for FailingSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.position == self.data.len() {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "share disconnected"));
        }
        let len = buf.len().min(self.data.len() - self.position);
        buf[..len].copy_from_slice(&self.data[self.position..self.position + len]);
        self.position += len;
        Ok(Some(len))
    }
}

/// Endless source counting its reads
struct EndlessSource {
    reads: Arc<AtomicUsize>,
}

impl Source for EndlessSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        buf.fill(b'z');
        Ok(Some(buf.len()))
    }
}

/// Sink that accepts `accept` writes and fails every write after that
#[derive(Default)]
struct RecordingSink {
    data: Vec<u8>,
    writes: usize,
    accept: usize,
    flushes: usize,
    panic_on_failure: bool,
}

impl Sink for RecordingSink {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.writes == self.accept {
            if self.panic_on_failure {
                panic!("sink defect");
            }
            return Err(io::Error::new(io::ErrorKind::WriteZero, "entry too large"));
        }
        self.writes += 1;
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[test]
fn test_source_failure_flushes_and_is_source_attributed() {
    let payload: Vec<u8> = (0..40u8).collect();
    let mut source = FailingSource::new(&payload);
    let mut sink = RecordingSink {
        accept: usize::MAX,
        ..RecordingSink::default()
    };

    let error = engine().cat(&mut source, &mut sink).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Source);
    assert_eq!(
        error.io_cause().map(io::Error::kind),
        Some(io::ErrorKind::ConnectionReset)
    );
    assert_eq!(sink.data, payload);
    assert_eq!(sink.flushes, 1);
}

#[test]
fn test_sink_failure_is_returned_unmodified_and_stops_reader() {
    let reads = Arc::new(AtomicUsize::new(0));
    let mut source = EndlessSource {
        reads: Arc::clone(&reads),
    };
    let mut sink = RecordingSink {
        accept: 3,
        ..RecordingSink::default()
    };

    let error = engine().cat(&mut source, &mut sink).unwrap_err();

    match error {
        Error::Sink { cause } => {
            assert_eq!(cause.kind(), io::ErrorKind::WriteZero);
            assert_eq!(cause.to_string(), "entry too large");
        }
        other => panic!("expected sink error, got {other:?}"),
    }
    assert_eq!(sink.writes, 3);
    assert_eq!(sink.data.len(), 3 * 16);
    assert_eq!(sink.flushes, 0);

    // the reader has terminated: no read happens after the call returned
    let reads_after_return = reads.load(Ordering::SeqCst);
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(reads.load(Ordering::SeqCst), reads_after_return);
}

#[test]
fn test_sink_failure_wins_over_source_failure() {
    let mut source = FailingSource::new(&[7u8; 16]);
    let mut sink = RecordingSink::default();

    let error = engine().cat(&mut source, &mut sink).unwrap_err();
    assert!(error.is_sink());
}

#[test]
fn test_source_panic_is_resumed_with_original_payload() {
    #[derive(Debug, PartialEq)]
    struct Corrupted(u32);

    struct PanickingSource;
    impl Source for PanickingSource {
        fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
            panic::panic_any(Corrupted(42));
        }
    }

    let engine = engine();
    let mut sink = RecordingSink {
        accept: usize::MAX,
        ..RecordingSink::default()
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.cat(&mut PanickingSource, &mut sink)
    }));

    let payload = outcome.unwrap_err();
    assert_eq!(payload.downcast_ref::<Corrupted>(), Some(&Corrupted(42)));
    assert_eq!(sink.flushes, 1);
    assert_eq!(engine.buffer_pool().idle_count(), 1);
}

#[test]
fn test_sink_panic_cancels_reader_and_releases_buffers() {
    let reads = Arc::new(AtomicUsize::new(0));
    let engine = engine();
    let mut source = EndlessSource {
        reads: Arc::clone(&reads),
    };
    let mut sink = RecordingSink {
        accept: 2,
        panic_on_failure: true,
        ..RecordingSink::default()
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.cat(&mut source, &mut sink)));
    assert!(outcome.is_err());

    let reads_after_return = reads.load(Ordering::SeqCst);
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert_eq!(reads.load(Ordering::SeqCst), reads_after_return);
    assert_eq!(engine.buffer_pool().idle_count(), 1);
}

#[derive(Default)]
struct Closable {
    fail_close: bool,
    closed: Arc<AtomicBool>,
}

impl Source for Closable {
    fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
        Ok(None)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "source close failed"));
        }
        Ok(())
    }
}

impl Sink for Closable {
    fn write_chunk(&mut self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "sink close failed"));
        }
        Ok(())
    }
}

#[test]
fn test_copy_reports_source_close_failure() {
    let source = Closable {
        fail_close: true,
        ..Closable::default()
    };
    let sink = Closable::default();
    let sink_closed = Arc::clone(&sink.closed);

    let error = engine().copy(source, sink).unwrap_err();

    assert!(error.is_source());
    assert!(error.to_string().contains("source close failed"));
    assert!(sink_closed.load(Ordering::SeqCst));
}

#[test]
fn test_copy_sink_close_failure_supersedes_source_close_failure() {
    let source = Closable {
        fail_close: true,
        ..Closable::default()
    };
    let sink = Closable {
        fail_close: true,
        ..Closable::default()
    };

    let error = engine().copy(source, sink).unwrap_err();

    assert!(error.is_sink());
    assert!(error.to_string().contains("sink close failed"));
}

#[test]
fn test_copy_keeps_cat_failure_when_closes_succeed() {
    let source = FailingSource::new(b"partial");
    let sink = Closable::default();
    let sink_closed = Arc::clone(&sink.closed);

    let error = engine().copy(source, sink).unwrap_err();

    assert!(error.is_source());
    assert!(error.to_string().contains("share disconnected"));
    assert!(sink_closed.load(Ordering::SeqCst));
}

#[test]
fn test_copy_closes_both_when_cat_panics() {
    struct PanickingSource {
        closed: Arc<AtomicBool>,
    }
    impl Source for PanickingSource {
        fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
            panic!("decoder bug");
        }
        fn close(&mut self) -> io::Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    let source_closed = Arc::new(AtomicBool::new(false));
    let source = PanickingSource {
        closed: Arc::clone(&source_closed),
    };
    let sink = Closable::default();
    let sink_closed = Arc::clone(&sink.closed);
    let engine = engine();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.copy(source, sink)));

    assert!(outcome.is_err());
    assert!(source_closed.load(Ordering::SeqCst));
    assert!(sink_closed.load(Ordering::SeqCst));
}

#[test]
fn test_std_reader_error_is_source_attributed() {
    struct Broken;
    impl io::Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked entry"))
        }
    }

    let mut sink = Vec::new();
    let error = engine()
        .cat(&mut ReadSource::new(Broken), &mut sink)
        .unwrap_err();
    assert!(error.is_source());

    // well-behaved readers are unaffected
    let mut source = ReadSource::new(Cursor::new(b"ok".to_vec()));
    engine().cat(&mut source, &mut sink).unwrap();
    assert_eq!(sink, b"ok");
}
