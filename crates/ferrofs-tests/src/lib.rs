//! FerroFS testing suite
//!
//! Integration tests and benchmarks for the FerroFS stream engine, plus the
//! scripted endpoints and fixtures they share.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Scripted sources and sinks with observable behaviour
pub mod endpoints;

/// Unified test utilities
///
/// This module provides common utilities used across all test files
/// to ensure consistency and reduce code duplication.
pub mod test_utils;

pub use endpoints::{EndpointDefect, Ending, Probe, RecordingSink, ScriptedSource, WriteFault};
pub use test_utils::{
    generate_test_data, init_tracing, init_tracing_with, CommonEntrySizes, TestDataPattern,
};
