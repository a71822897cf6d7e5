//! Error types for the Mermaid loader.
//!
//! Every failure that can cross the loader boundary is a `LoaderError`.
//! The type is `Clone` because a single load episode hands the same outcome
//! to every caller that joined it.

use thiserror::Error;

/// Result type for loader operations
pub type LoaderResult<T> = std::result::Result<T, LoaderError>;

/// Errors produced while resolving, fetching, activating or rendering
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// Registry query or asset download failed (transport, status or timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Installed code did not expose the expected capability surface
    #[error("Activation error: {0}")]
    Activation(String),

    /// Cache or settings store could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// The loaded library rejected a diagram
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LoaderError {
    pub fn network(msg: impl Into<String>) -> Self {
        LoaderError::Network(msg.into())
    }

    pub fn activation(msg: impl Into<String>) -> Self {
        LoaderError::Activation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        LoaderError::Storage(msg.into())
    }

    /// Whether this error came from the network layer
    pub fn is_network(&self) -> bool {
        matches!(self, LoaderError::Network(_))
    }

    /// Whether this error came from activation
    pub fn is_activation(&self) -> bool {
        matches!(self, LoaderError::Activation(_))
    }
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(err: serde_json::Error) -> Self {
        LoaderError::Storage(format!("invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::network("registry timed out");
        assert_eq!(err.to_string(), "Network error: registry timed out");

        let err = LoaderError::activation("mermaid global missing");
        assert!(err.to_string().contains("Activation error"));
    }

    #[test]
    fn test_loader_error_kinds() {
        assert!(LoaderError::network("x").is_network());
        assert!(!LoaderError::network("x").is_activation());
        assert!(LoaderError::activation("x").is_activation());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(LoaderError::from(io), LoaderError::Storage(_)));
    }
}
