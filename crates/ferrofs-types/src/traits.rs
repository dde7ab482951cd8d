//! Endpoint traits for stream copies
//!
//! A copy moves bytes from a [`Source`] to a [`Sink`]. Archive drivers, file
//! adapters and test doubles implement these two traits; the copy engine never
//! needs to know more about an endpoint than what is declared here.

use std::io;

/// The reading end of a copy
pub trait Source {
    /// Read up to `buf.len()` bytes into `buf`.
    ///
    /// `Ok(Some(n))` reports progress and `n` may be less than `buf.len()`, including
    /// zero. A zero-length read is not the end of the stream. `Ok(None)` signals the
    /// end of the stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Release the underlying resource
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The writing end of a copy
pub trait Sink {
    /// Write the whole of `buf`
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Push buffered data to the underlying resource
    fn flush(&mut self) -> io::Result<()>;

    /// Release the underlying resource
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).read_chunk(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        (**self).read_chunk(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<K: Sink + ?Sized> Sink for &mut K {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<K: Sink + ?Sized> Sink for Box<K> {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_chunk(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// An in-memory sink, mostly useful for buffering small entries
impl Sink for Vec<u8> {
    fn write_chunk(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
