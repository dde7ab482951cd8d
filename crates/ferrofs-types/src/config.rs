//! Configuration types for FerroFS
//!
//! This module provides type-safe configuration structures with validation
//! and serialization support.

use crate::{Error, Result};
use std::time::Duration;

/// Capacity of a single ring buffer slot, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct BufferCapacity(usize);

impl BufferCapacity {
    /// Minimum slot capacity
    pub const MIN: usize = 1;
    /// Maximum slot capacity (64MB)
    pub const MAX: usize = 64 * 1024 * 1024;
    /// Default slot capacity (8KB)
    pub const DEFAULT: usize = 8 * 1024;

    /// Create a new buffer capacity with validation
    pub fn new(size: usize) -> std::result::Result<Self, String> {
        if size < Self::MIN {
            Err(format!("Buffer capacity {} is below minimum {}", size, Self::MIN))
        } else if size > Self::MAX {
            Err(format!("Buffer capacity {} exceeds maximum {}", size, Self::MAX))
        } else {
            Ok(Self(size))
        }
    }

    /// Get the buffer capacity value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BufferCapacity {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for BufferCapacity {
    type Error = String;

    fn try_from(size: usize) -> std::result::Result<Self, String> {
        Self::new(size)
    }
}

impl From<BufferCapacity> for usize {
    fn from(capacity: BufferCapacity) -> Self {
        capacity.get()
    }
}

/// Number of slots in a ring buffer.
///
/// One slot is filled by the reader while the writer drains another, so at least two
/// are required. The default of four smooths out oscillating bandwidth such as that
/// of network shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct FifoDepth(usize);

impl FifoDepth {
    /// Minimum depth
    pub const MIN: usize = 2;
    /// Maximum depth
    pub const MAX: usize = 1024;
    /// Default depth
    pub const DEFAULT: usize = 4;

    /// Create a new FIFO depth with validation
    pub fn new(depth: usize) -> std::result::Result<Self, String> {
        if depth < Self::MIN {
            Err(format!("FIFO depth {} is below minimum {}", depth, Self::MIN))
        } else if depth > Self::MAX {
            Err(format!("FIFO depth {} exceeds maximum {}", depth, Self::MAX))
        } else {
            Ok(Self(depth))
        }
    }

    /// Get the FIFO depth value
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for FifoDepth {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<usize> for FifoDepth {
    type Error = String;

    fn try_from(depth: usize) -> std::result::Result<Self, String> {
        Self::new(depth)
    }
}

impl From<FifoDepth> for usize {
    fn from(depth: FifoDepth) -> Self {
        depth.get()
    }
}

/// Settings of a stream copy engine.
///
/// These are fixed when the engine is constructed; individual copy calls cannot
/// override them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Capacity of each ring buffer slot
    pub buffer_capacity: BufferCapacity,
    /// Number of slots per ring buffer
    pub fifo_depth: FifoDepth,
    /// Maximum number of idle buffer sets kept for reuse
    pub pool_capacity: usize,
    /// How long an idle reader thread waits for new work before it exits
    pub worker_keep_alive: Duration,
    /// Name given to reader threads
    pub worker_name: String,
}

impl EngineConfig {
    /// Default keep-alive of idle reader threads
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
    /// Default number of pooled buffer sets
    pub const DEFAULT_POOL_CAPACITY: usize = 16;

    /// Create a configuration with the given slot capacity and FIFO depth
    pub fn new(buffer_capacity: usize, fifo_depth: usize) -> Result<Self> {
        Ok(Self {
            buffer_capacity: BufferCapacity::new(buffer_capacity).map_err(Error::config)?,
            fifo_depth: FifoDepth::new(fifo_depth).map_err(Error::config)?,
            ..Self::default()
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        BufferCapacity::new(self.buffer_capacity.get()).map_err(Error::config)?;
        FifoDepth::new(self.fifo_depth.get()).map_err(Error::config)?;
        if self.worker_keep_alive.is_zero() {
            return Err(Error::config("Worker keep-alive must be greater than zero"));
        }
        if self.worker_name.is_empty() {
            return Err(Error::config("Worker name must not be empty"));
        }
        Ok(())
    }

    /// Bytes held by one buffer set
    pub fn buffer_set_bytes(&self) -> usize {
        self.buffer_capacity.get() * self.fifo_depth.get()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: BufferCapacity::default(),
            fifo_depth: FifoDepth::default(),
            pool_capacity: Self::DEFAULT_POOL_CAPACITY,
            worker_keep_alive: Self::DEFAULT_KEEP_ALIVE,
            worker_name: "ferrofs-reader".to_string(),
        }
    }
}
