//! Pipelined stream copy engine for FerroFS
//!
//! Every read or write of an archive entry ends up moving bytes between two
//! endpoints: the archive's physical storage and the entry's logical stream. This
//! crate does that move:
//!
//! - **Overlapped I/O**: a pooled reader thread fills a small ring of buffers while
//!   the calling thread drains it, hiding the latency of slow or bursty media
//! - **Exact error attribution**: source and sink failures are distinct errors, and
//!   a panicking source is re-raised with its original payload
//! - **Safe reuse**: buffer sets are pooled and only pooled again after the reader
//!   that used them has stopped
//! - **std adapters**: any [`std::io::Read`] or [`std::io::Write`] can be an endpoint
//!
//! # Examples
//!
//! ```rust
//! use ferrofs_io::{ReadSource, StreamEngine};
//! use std::io::Cursor;
//!
//! # fn example() -> ferrofs_types::Result<()> {
//! let engine = StreamEngine::default();
//! let mut source = ReadSource::new(Cursor::new(b"entry data".to_vec()));
//! let mut sink = Vec::new();
//!
//! let stats = engine.cat(&mut source, &mut sink)?;
//! assert_eq!(stats.bytes_copied, 10);
//! assert_eq!(sink, b"entry data");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use ferrofs_types::{CopyStats, Result, Sink, Source};

pub mod buffer;
pub mod copy;
mod reader;
mod ring;
pub mod stream;
pub mod worker;

#[cfg(test)]
mod error_tests;

pub use buffer::{Buffer, BufferPool, BufferSet};
pub use copy::StreamEngine;
pub use stream::{ReadSource, WriteSink};
pub use worker::{TaskHandle, WorkerPool};

/// Copy `source` to `sink` on the process-wide engine without closing either.
///
/// See [`StreamEngine::cat`].
pub fn cat<S, K>(source: &mut S, sink: &mut K) -> Result<CopyStats>
where
    S: Source + Send + ?Sized,
    K: Sink + ?Sized,
{
    StreamEngine::global().cat(source, sink)
}

/// Copy `source` to `sink` on the process-wide engine and close both.
///
/// See [`StreamEngine::copy`].
pub fn copy<S, K>(source: S, sink: K) -> Result<CopyStats>
where
    S: Source + Send,
    K: Sink,
{
    StreamEngine::global().copy(source, sink)
}
