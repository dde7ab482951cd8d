//! Unified test utilities for FerroFS tests and benchmarks
//!
//! Deterministic payload generation, file fixtures and tracing setup shared by
//! the integration tests and benchmarks.

use ferrofs_config::LoggingConfig;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Test data generation patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDataPattern {
    /// All zeros
    Zeros,
    /// Deterministic pseudo-random bytes
    Random,
    /// Repeating byte ramp, makes misordered chunks easy to spot
    Sequential,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Random => {
            // xorshift keeps runs reproducible
            let mut state = 0x2545_f491_4f6c_dd1d_u64;
            (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 24) as u8
                })
                .collect()
        }
        TestDataPattern::Sequential => (0..size).map(|i| (i % 251) as u8).collect(),
    }
}

/// Create a file with test data inside `temp_dir`
pub fn create_test_file(
    temp_dir: &TempDir,
    name: &str,
    size: usize,
    pattern: TestDataPattern,
) -> io::Result<PathBuf> {
    let file_path = temp_dir.path().join(name);
    fs::write(&file_path, generate_test_data(size, pattern))?;
    Ok(file_path)
}

/// Entry sizes exercised by tests and benchmarks
pub struct CommonEntrySizes;

impl CommonEntrySizes {
    /// Empty entry
    pub const EMPTY: usize = 0;
    /// Smaller than a single default slot
    pub const TINY: usize = 512;
    /// A few default slots
    pub const SMALL: usize = 64 * 1024;
    /// Many ring rotations
    pub const LARGE: usize = 4 * 1024 * 1024;

    /// All sizes with a label
    pub fn all() -> Vec<(&'static str, usize)> {
        vec![
            ("empty", Self::EMPTY),
            ("512B", Self::TINY),
            ("64KB", Self::SMALL),
            ("4MB", Self::LARGE),
        ]
    }
}

/// Install a test subscriber once per process, honouring `RUST_LOG`
pub fn init_tracing() {
    init_tracing_with(&LoggingConfig {
        level: "warn".to_string(),
        ..LoggingConfig::default()
    });
}

/// Install a subscriber shaped by the logging section of a loaded configuration.
///
/// `RUST_LOG` still wins over the configured level. Only the first call in a
/// process installs anything.
pub fn init_tracing_with(config: &LoggingConfig) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = log_filter(config);
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer();
        let _ = if config.json_format {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    });
}

fn log_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}
