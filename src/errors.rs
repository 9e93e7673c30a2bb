//! Error types for reveal_core
//!
//! One variant per failure kind the pipeline can report. Only user-input
//! contradictions and genuine I/O failures are fatal; every other kind degrades
//! to a partial, clearly marked result.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for reveal_core operations
#[derive(Debug, Error)]
pub enum RevealError {
    /// No extractor resolves for this path; callers fall back to a raw view
    #[error("No extractor registered for {}", path.display())]
    UnsupportedFile { path: PathBuf },

    /// The extractor could not parse the file; a partial structure exists
    #[error("Malformed source in {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    /// Requested element is absent; `available` lists what the file does contain
    #[error("Element '{name}' not found in {}{}", path.display(), format_available(available))]
    ElementNotFound {
        path: PathBuf,
        category: String,
        name: String,
        available: Vec<String>,
    },

    /// Conflicting or malformed head/tail/range request
    #[error("Invalid slice request: {0}")]
    InvalidSlice(String),

    /// One detector failed; isolated from the rest of the run
    #[error("Detector {id} failed: {reason}")]
    DetectorFailure { id: String, reason: String },

    /// Non-UTF-8 bytes were substituted while decoding
    #[error("{} contains invalid UTF-8 ({count} replacement characters substituted)", path.display())]
    EncodingError { path: PathBuf, count: usize },

    /// File exceeded the configured read limit
    #[error("{} is {size} bytes, over the {limit} byte limit (use force to override)", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Per-file analysis budget exhausted
    #[error("Analysis of {} exceeded {timeout:?}", path.display())]
    Timeout { path: PathBuf, timeout: Duration },

    /// Missing file, permission denied, ...
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}

impl RevealError {
    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RevealError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RevealError::Config(msg.into())
    }

    /// Create an invalid slice error
    pub fn invalid_slice(msg: impl Into<String>) -> Self {
        RevealError::InvalidSlice(msg.into())
    }

    /// Whether this error must abort the command rather than degrade
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RevealError::Io { .. } | RevealError::InvalidSlice(_) | RevealError::Config(_)
        )
    }
}

/// Result type alias for reveal operations
pub type Result<T> = std::result::Result<T, RevealError>;
