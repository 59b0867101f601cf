//! Error types for xmlsplit.
//!
//! Uses the dual-error pattern: `XmlSplitError` for library consumers with
//! the offending file path attached, and `ScanError` for the scanner, which
//! has no notion of which file it is reading.

use thiserror::Error;

use crate::xml::ScanError;

/// Main error type for the xmlsplit library.
#[derive(Debug, Error)]
pub enum XmlSplitError {
    /// Reader misconfiguration, detected before any file is opened.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file or output stream could not be opened, read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The markup scan hit something it cannot get past.
    #[error("Malformed XML in {path} at line {line}, column {column}: {message}")]
    MalformedMarkup {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// The downstream sink rejected a batch.
    #[error("Failed to deliver batch: {0}")]
    Sink(String),

    /// YAML serialization error.
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl XmlSplitError {
    /// Wrap an IO error with the path of the file being processed.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a scanner error with the path of the file being scanned.
    pub fn scan(path: impl Into<String>, err: ScanError) -> Self {
        match err {
            ScanError::Io(source) => Self::io(path, source),
            ScanError::Markup(markup) => Self::MalformedMarkup {
                path: path.into(),
                line: markup.position.line,
                column: markup.position.column,
                message: markup.message,
            },
        }
    }
}

/// Result type alias for xmlsplit operations.
pub type Result<T> = std::result::Result<T, XmlSplitError>;
