//! Error types and handling for FerroFS
//!
//! Every failure of a stream copy is attributed to the endpoint that caused it.
//! Callers match on [`Error::Source`] and [`Error::Sink`] to learn which side of the
//! transfer misbehaved; the remaining variants cover invalid settings and a worker
//! pool that could not start a reader thread.

use std::io;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - entire process should be terminated
    Critical,
}

/// Main error type for FerroFS operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reading from the source endpoint failed
    #[error("Source I/O error: {cause}")]
    Source {
        /// Error raised by the source
        #[source]
        cause: io::Error,
    },

    /// Writing, flushing or closing the sink endpoint failed
    #[error("Sink I/O error: {cause}")]
    Sink {
        /// Error raised by the sink, unmodified
        #[source]
        cause: io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The worker pool could not start a reader thread
    #[error("Failed to start reader thread: {cause}")]
    Spawn {
        /// Error returned by the thread builder
        #[source]
        cause: io::Error,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source-attributed failure
    Source,
    /// Sink-attributed failure
    Sink,
    /// Configuration errors
    Config,
    /// Worker thread could not be spawned
    Spawn,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Source { .. } => ErrorKind::Source,
            Self::Sink { .. } => ErrorKind::Sink,
            Self::Config { .. } => ErrorKind::Config,
            Self::Spawn { .. } => ErrorKind::Spawn,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Source { .. } | Self::Sink { .. } => ErrorSeverity::Medium,
            Self::Config { .. } => ErrorSeverity::High,
            Self::Spawn { .. } => ErrorSeverity::High,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Source { cause } | Self::Sink { cause } => matches!(
                cause.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::Config { .. } => false,
            Self::Spawn { .. } => true,
        }
    }

    /// Check if this error should trigger a retry by the caller.
    ///
    /// The copy engine itself never retries.
    pub fn should_retry(&self) -> bool {
        self.is_recoverable() && self.severity() <= ErrorSeverity::Medium
    }

    /// Returns `true` if the source endpoint caused this error
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source { .. })
    }

    /// Returns `true` if the sink endpoint caused this error
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink { .. })
    }

    /// Attribute an I/O error to the source endpoint.
    ///
    /// An I/O error that already carries a source-attributed [`Error`] (for example a
    /// source which is itself fed by another copy) is unwrapped instead of being
    /// wrapped a second time.
    pub fn source_failure(cause: io::Error) -> Self {
        let already_attributed = cause
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<Self>())
            .is_some_and(Self::is_source);
        if !already_attributed {
            return Self::Source { cause };
        }

        let kind = cause.kind();
        match cause.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(error)) => *error,
            Some(Err(other)) => Self::Source {
                cause: io::Error::new(kind, other),
            },
            None => Self::Source {
                cause: io::Error::from(kind),
            },
        }
    }

    /// Attribute an I/O error to the sink endpoint
    pub fn sink_failure(cause: io::Error) -> Self {
        Self::Sink { cause }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new spawn error
    pub fn spawn(cause: io::Error) -> Self {
        Self::Spawn { cause }
    }

    /// The underlying I/O error, if there is one
    pub fn io_cause(&self) -> Option<&io::Error> {
        match self {
            Self::Source { cause } | Self::Sink { cause } | Self::Spawn { cause } => Some(cause),
            Self::Config { .. } => None,
        }
    }
}

/// Converts back into the I/O world used by archive drivers.
///
/// Sink failures surface as the sink's own error; everything else is wrapped so that
/// [`Error::source_failure`] can recognise it again further up the stack.
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Sink { cause } => cause,
            other => {
                let kind = other
                    .io_cause()
                    .map_or(io::ErrorKind::InvalidInput, io::Error::kind);
                io::Error::new(kind, other)
            }
        }
    }
}
