//! Error types for docsmith.
//!
//! Library crates use [`DocsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`DocsmithError::Scan`] and setup-level `Config`/`Io` errors abort a
//! build. Everything scoped to a single record is caught at the record
//! boundary by the stage that raised it.

use std::path::PathBuf;

/// Top-level error type for all docsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum DocsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The source root could not be enumerated. Fatal, raised before any mutation.
    #[error("scan error at {root:?}: {message}")]
    Scan { root: PathBuf, message: String },

    /// A single record's file could not be read or written.
    #[error("record I/O error at {path:?}: {source}")]
    RecordIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The enrichment collaborator failed or returned an unparseable shape.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The classification collaborator failed or returned malformed output.
    #[error("classification error: {0}")]
    Classification(String),

    /// The translation collaborator failed or returned empty output.
    #[error("translation error: {0}")]
    Translation(String),

    /// The persisted registry store could not be parsed.
    #[error("registry store at {path:?} is corrupt: {message}")]
    StoreCorrupt { path: PathBuf, message: String },

    /// Filesystem I/O error outside a single record's scope.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network/HTTP error talking to a completion service.
    #[error("network error: {0}")]
    Network(String),

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsmithError>;

impl DocsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a scan error for the given source root.
    pub fn scan(root: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Scan {
            root: root.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `std::io::Error` scoped to one record's file.
    pub fn record_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RecordIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocsmithError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DocsmithError::validation("store version 99 not supported");
        assert!(err.to_string().contains("version 99"));

        let err = DocsmithError::Translation("empty output".into());
        assert_eq!(err.to_string(), "translation error: empty output");
    }

    #[test]
    fn record_io_keeps_path() {
        let err = DocsmithError::record_io(
            "docs/a.md",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("docs/a.md"));
        assert!(msg.contains("gone"));
    }
}
