//! Core data types for FerroFS

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transfer rate in bytes per second
pub type TransferRate = f64;

/// Statistics of a single stream copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CopyStats {
    /// Total bytes written to the sink
    pub bytes_copied: u64,
    /// Number of non-empty slots written to the sink
    pub chunks_written: u64,
    /// Number of reads that returned zero bytes without ending the stream
    pub zero_length_reads: u64,
    /// Total duration of the operation
    pub duration: Duration,
}

impl CopyStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the overall transfer rate
    pub fn transfer_rate(&self) -> TransferRate {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_copied as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &CopyStats) {
        self.bytes_copied += other.bytes_copied;
        self.chunks_written += other.chunks_written;
        self.zero_length_reads += other.zero_length_reads;
        self.duration += other.duration;
    }
}
