//! Error types for server startup and configuration.
//!
//! Request-time failures are handled by the API layer's response mapping;
//! this module covers the failures that stop the server from coming up at
//! all: unreadable configuration, invalid values, and missing credentials.

use std::path::PathBuf;

/// A specialized `Result` type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur while bringing the server up.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your mathbuddy.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// A required environment variable is not set.
    #[error("Environment variable '{name}' is not set\n\nSuggestion: {suggestion}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingEnvVar` error.
    #[must_use]
    pub fn missing_env_var(name: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::MissingEnvVar {
            name: name.into(),
            suggestion: suggestion.into(),
        }
    }
}
