//! Error types for the Reliant protocol.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced when validating a [`SocketConfig`](super::SocketConfig).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A configuration field holds an unusable value.
    #[error("invalid configuration for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        ConfigError::Invalid { field, reason }
    }
}

/// Top-level Reliant errors.
#[derive(Debug, Error)]
pub enum ReliantError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::invalid("mtu", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration for `mtu`: must be positive"
        );
    }

    #[test]
    fn test_top_level_conversion() {
        let err: ReliantError = ConfigError::invalid("port", "taken").into();
        assert!(matches!(err, ReliantError::Config(_)));

        let err: ReliantError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, ReliantError::Transport(_)));
    }
}
