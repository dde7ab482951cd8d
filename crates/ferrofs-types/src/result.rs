//! Result type alias for FerroFS operations

use crate::Error;

/// Result type alias for FerroFS operations
pub type Result<T> = std::result::Result<T, Error>;
