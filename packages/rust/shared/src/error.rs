//! Error types for autobump.
//!
//! Library crates use [`AutobumpError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all autobump operations.
#[derive(Debug, thiserror::Error)]
pub enum AutobumpError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// YAML or TOML decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Pipeline validation error (dangling references, unknown kinds, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Crawler construction or execution error.
    #[error("crawler error: {0}")]
    Crawler(String),

    /// A discovered manifest could not be turned into a pipeline.
    #[error("{name:?} - {source}")]
    Instantiate {
        name: String,
        source: Box<AutobumpError>,
    },

    /// A blocking crawler task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AutobumpError>;

impl AutobumpError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a crawler error from any displayable message.
    pub fn crawler(msg: impl Into<String>) -> Self {
        Self::Crawler(msg.into())
    }

    /// Attribute an error to the manifest it was raised for.
    pub fn instantiate(name: impl Into<String>, source: AutobumpError) -> Self {
        Self::Instantiate {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
