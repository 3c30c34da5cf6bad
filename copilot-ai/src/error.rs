//! Error types for copilot AI operations.

use std::fmt;

/// Universal error type that abstracts provider-specific errors into common variants.
///
/// All provider implementations map their native errors to these variants,
/// preserving context while keeping a provider-agnostic interface, so that
/// orchestration code never needs provider-specific error handling.
#[derive(Debug)]
pub enum Error {
    /// API key authentication failures. Indicates credentials are invalid,
    /// expired, or lack necessary permissions.
    Authentication(String),

    /// Network connectivity issues, DNS failures, or connection timeouts.
    /// Typically transient.
    Network(String),

    /// Invalid parameters, missing required fields, or malformed configuration.
    /// Indicates a programming error to fix at development time.
    Configuration(String),

    /// Provider-side business logic errors (e.g., model overloaded, audio
    /// format rejected, quota exceeded).
    Provider(String),

    /// Operation exceeded the configured or provider-enforced timeout period.
    Timeout(String),

    /// Failed to serialize a request body to JSON.
    Serialization(String),

    /// Failed to deserialize a provider response to the expected shape.
    Deserialization(String),

    /// Catch-all for errors that don't fit other categories.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            Error::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
