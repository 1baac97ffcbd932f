//! Error types and result handling for blobsniff.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blobsniff operations.
///
/// Per-format checks never surface these to callers: they are caught and
/// folded into a [`Verdict`](crate::core::types::Verdict). They escape only
/// from the low-level open/read primitives and from configuration handling.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to open file: {path}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Format Errors =====
    #[error("Malformed archive: {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Corrupt {format} stream: {path}")]
    Decompress {
        path: PathBuf,
        format: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile markup pattern: {0}")]
    PatternCompile(String),

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file open error.
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create an archive structure error.
    pub fn archive(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Archive {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Create a decompression error.
    pub fn decompress(
        path: impl Into<PathBuf>,
        format: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::Decompress {
            path: path.into(),
            format,
            source,
        }
    }

    /// Check if this error can be folded into a verdict instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. } | Error::Archive { .. } | Error::Decompress { .. }
        )
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileOpen { .. } | Error::FileRead { .. } => ErrorCategory::Io,

            Error::Archive { .. } | Error::Decompress { .. } | Error::PatternCompile(_) => {
                ErrorCategory::Format
            }

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::Internal(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Format,
    Configuration,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Format => write!(f, "Format"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::decompress(
            "/uploads/a.gz",
            "gzip",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad header"),
        );
        assert_eq!(err.to_string(), "Corrupt gzip stream: /uploads/a.gz");
    }

    #[test]
    fn test_recoverable_errors() {
        let err = Error::archive("/uploads/a.zip", "no central directory");
        assert!(err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Format);

        let err = Error::file_open(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
