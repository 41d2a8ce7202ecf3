//! # Error Handling Module
//!
//! Crate-wide error type built on `thiserror`. Startup and wiring return
//! [`GateResult`]; the per-request authentication path converts failures into
//! an [`AuthRejection`](crate::auth::AuthRejection) at the single call site and
//! never propagates them further.

use thiserror::Error;

/// Main result type used throughout the gate.
pub type GateResult<T> = Result<T, GateError>;

/// Error types for the authentication gate
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// Invalid configuration or environment overrides
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Credential store failures (connection or backend problems)
    #[error("Credential store error: {message}")]
    Store { message: String },

    /// Internal errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (config file reads, socket binding, serving)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl GateError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a credential store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for GateError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}
