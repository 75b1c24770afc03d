//! Error types for resource-manager.
//!
//! Configuration and path errors propagate to the caller. Transfer and
//! availability problems are normally logged and converted into empty or
//! partial results by the providers; the variants exist so the internals can
//! use `?` and so callers that want a hard failure (the CLI) can produce one.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for resource-manager operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The configuration tree violates its schema.
    #[error("Invalid configuration at '{field}': {message}")]
    ConfigInvalid { field: String, message: String },

    /// A dotted/indexed configuration address could not be parsed.
    #[error("Invalid configuration path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A provider entry could not be turned into a provider.
    #[error("Cannot construct provider '{name}': {reason}")]
    ProviderConstruction { name: String, reason: String },

    /// The provider's backend cannot be reached.
    #[error("Provider '{0}' is not available")]
    ProviderUnavailable(String),

    /// A single file failed to enumerate, fetch, or write.
    #[error("Failed to transfer '{path}': {reason}")]
    Transfer { path: String, reason: String },

    /// An include/exclude or file pattern is not a valid glob.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Filesystem error on the configuration file or a target directory.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("Failed to parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ResourceError {
    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transfer(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transfer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for resource-manager operations.
pub type Result<T> = std::result::Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_names_the_field() {
        let err = ResourceError::config("providers.github[0].url", "GitHub provider must have a URL");
        assert_eq!(
            err.to_string(),
            "Invalid configuration at 'providers.github[0].url': GitHub provider must have a URL"
        );
    }

    #[test]
    fn transfer_error_keeps_the_relative_path() {
        let err = ResourceError::transfer("docs/a.md", "HTTP 404");
        assert_eq!(err.to_string(), "Failed to transfer 'docs/a.md': HTTP 404");
    }

    #[test]
    fn io_error_exposes_its_source() {
        use std::error::Error as _;

        let err = ResourceError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
    }
}
