//! Scripted sources and sinks
//!
//! Every endpoint reports into a shared [`Probe`], so a test can still observe it
//! after handing the endpoint to `copy` by value, and after the call returned.

use ferrofs_types::{Sink, Source};
use std::io;
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Counters shared between an endpoint and the test observing it
#[derive(Debug, Default)]
pub struct Probe {
    reads: AtomicUsize,
    writes: AtomicUsize,
    flushes: AtomicUsize,
    closes: AtomicUsize,
    busy: AtomicBool,
    overlaps: AtomicUsize,
}

impl Probe {
    /// Create a new shared probe
    pub fn new() -> Arc<Self> {
        Arc::default()
    }

    /// Number of `read_chunk` calls
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write_chunk` calls, successful or not
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of `flush` calls
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of `close` calls
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of calls that started while another call was still running
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    /// Run `call` as one access to the endpoint, detecting overlapping access
    fn access<T>(&self, counter: &AtomicUsize, call: impl FnOnce() -> T) -> T {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let guard = BusyGuard(&self.busy);
        let value = call();
        drop(guard);
        value
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Panic payload raised by scripted endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDefect(pub String);

/// What a scripted source does once its data is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Report the end of the stream
    Eof,
    /// Fail with an I/O error of this kind
    Fail(io::ErrorKind),
    /// Panic with an [`EndpointDefect`]
    Panic,
    /// Never end, filling every buffer with `0x7a`
    Endless,
}

/// Source replaying a payload with scripted read lengths.
///
/// Read lengths cycle through `steps`; a step of zero is a zero-length read and a
/// step larger than the buffer fills the whole buffer.
#[derive(Debug)]
pub struct ScriptedSource {
    data: Vec<u8>,
    position: usize,
    steps: Vec<usize>,
    step: usize,
    ending: Ending,
    read_delay: Option<Duration>,
    fail_close: bool,
    probe: Arc<Probe>,
}

impl ScriptedSource {
    /// Source delivering `data` in full-buffer reads, then reporting the end
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            steps: vec![usize::MAX],
            step: 0,
            ending: Ending::Eof,
            read_delay: None,
            fail_close: false,
            probe: Probe::new(),
        }
    }

    /// Source that never ends
    pub fn endless() -> Self {
        Self::new(Vec::new()).ending(Ending::Endless)
    }

    /// Cycle read lengths through `steps`
    pub fn steps(mut self, steps: impl Into<Vec<usize>>) -> Self {
        let steps = steps.into();
        assert!(steps.iter().any(|&step| step > 0), "steps must make progress");
        self.steps = steps;
        self
    }

    /// Behaviour once the data is exhausted
    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    /// Sleep before every read, like slow media
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Fail `close` with an I/O error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// The probe this source reports into
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    fn next_len(&mut self, capacity: usize) -> usize {
        let wanted = self.steps[self.step % self.steps.len()];
        self.step += 1;
        wanted.min(capacity)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if self.position == self.data.len() {
            return match self.ending {
                Ending::Eof => Ok(None),
                Ending::Fail(kind) => Err(io::Error::new(kind, "scripted source failure")),
                Ending::Panic => panic::panic_any(EndpointDefect(format!(
                    "source defect after {} bytes",
                    self.position
                ))),
                Ending::Endless => {
                    let len = self.next_len(buf.len());
                    buf[..len].fill(0x7a);
                    Ok(Some(len))
                }
            };
        }

        let len = self
            .next_len(buf.len())
            .min(self.data.len() - self.position);
        buf[..len].copy_from_slice(&self.data[self.position..self.position + len]);
        self.position += len;
        Ok(Some(len))
    }
}

impl Source for ScriptedSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let probe = Arc::clone(&self.probe);
        probe.access(&probe.reads, || self.read(buf))
    }

    fn close(&mut self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "source close failed"));
        }
        Ok(())
    }
}

/// How a recording sink misbehaves on its n-th write (counting from zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFault {
    /// Fail with an I/O error of this kind
    Fail(usize, io::ErrorKind),
    /// Panic with an [`EndpointDefect`]
    Panic(usize),
}

/// Sink recording everything it receives
#[derive(Debug)]
pub struct RecordingSink {
    data: Vec<u8>,
    chunks: Vec<usize>,
    fault: Option<WriteFault>,
    write_delay: Option<Duration>,
    fail_flush: bool,
    fail_close: bool,
    probe: Arc<Probe>,
}

impl RecordingSink {
    /// Sink accepting everything
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            chunks: Vec::new(),
            fault: None,
            write_delay: None,
            fail_flush: false,
            fail_close: false,
            probe: Probe::new(),
        }
    }

    /// Misbehave on one write
    pub fn fault(mut self, fault: WriteFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Sleep before every write, like a congested destination
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fail `flush` with an I/O error
    pub fn failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    /// Fail `close` with an I/O error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// The probe this sink reports into
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    /// Bytes accepted so far
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Lengths of the accepted chunks
    pub fn chunks(&self) -> &[usize] {
        &self.chunks
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if let Some(delay) = self.write_delay {
            thread::sleep(delay);
        }
        match self.fault {
            Some(WriteFault::Fail(at, kind)) if at == self.chunks.len() => {
                return Err(io::Error::new(kind, "scripted sink failure"));
            }
            Some(WriteFault::Panic(at)) if at == self.chunks.len() => {
                panic::panic_any(EndpointDefect(format!("sink defect at write {at}")));
            }
            _ => {}
        }
        self.chunks.push(buf.len());
        self.data.extend_from_slice(buf);
        Ok(())
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for RecordingSink {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        let probe = Arc::clone(&self.probe);
        probe.access(&probe.writes, || self.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush {
            return Err(io::Error::new(io::ErrorKind::Other, "sink flush failed"));
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "sink close failed"));
        }
        Ok(())
    }
}
