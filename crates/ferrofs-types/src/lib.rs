//! Core type system and error handling for FerroFS
//!
//! This crate provides the foundational types shared by the FerroFS crates:
//!
//! - **Error handling**: source- and sink-attributed errors with severity levels
//! - **Endpoints**: the [`Source`] and [`Sink`] traits every copy runs between
//! - **Configuration**: validated engine settings
//! - **Statistics**: per-copy accounting
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use ferrofs_types::{EngineConfig, Error, Result};
//!
//! fn small_slots() -> Result<EngineConfig> {
//!     EngineConfig::new(4096, 2)
//! }
//!
//! assert!(small_slots().is_ok());
//! assert!(matches!(EngineConfig::new(4096, 1), Err(Error::Config { .. })));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BufferCapacity, EngineConfig, FifoDepth};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::{Sink, Source};
pub use types::*;
