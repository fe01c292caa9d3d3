//! Crate-level error type for the melody analysis core.

/// Errors raised by configuration, detection and audio setup.
///
/// Analysis itself never fails: degenerate input produces conservative
/// defaults instead of an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration `{name}`: {reason}")]
    InvalidConfig {
        name: &'static str,
        reason: String,
    },

    /// The detector was handed a buffer of the wrong length.
    #[error("buffer size mismatch: expected {expected} samples, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },

    /// Audio device or stream setup failed.
    #[error("audio error: {0}")]
    Audio(String),

    /// Settings file I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed or written.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_config(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            name,
            reason: reason.into(),
        }
    }
}

/// Convenience Result type for melody-core operations.
pub type Result<T> = std::result::Result<T, Error>;
