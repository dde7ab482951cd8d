//! Adapters between `std::io` and the FerroFS endpoint traits

use ferrofs_types::{Sink, Source};
use std::io::{self, Read, Write};

/// A [`Source`] reading from any [`Read`] implementation.
///
/// `Read` signals the end of the stream with a zero-length read, so this adapter
/// reports `Ok(0)` on a non-empty buffer as the end of the stream.
/// [`io::ErrorKind::Interrupted`] is retried as the `Read` contract asks for.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: R,
    bytes_read: u64,
}

impl<R: Read> ReadSource<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// Number of bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Get a reference to the wrapped reader
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source for ReadSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            match self.inner.read(buf) {
                Ok(0) if !buf.is_empty() => return Ok(None),
                Ok(len) => {
                    self.bytes_read += len as u64;
                    return Ok(Some(len));
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        }
    }
}

/// A [`Sink`] writing to any [`Write`] implementation.
///
/// Closing flushes; the writer itself is released when the adapter is dropped.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> WriteSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Number of bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Get a reference to the wrapped writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for WriteSink<W> {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
