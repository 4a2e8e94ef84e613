//! Core error types for the Delta application.
//!
//! `DeltaError` covers input validation for the shared types and
//! `ConfigError` covers configuration loading. Source adapters carry their
//! own taxonomy in `delta-sources`.

use thiserror::Error;

/// Errors raised while validating user input.
#[derive(Error, Debug)]
pub enum DeltaError {
    /// Search term cannot be parsed into the shape an operation requires
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `DeltaError`.
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeltaError::MalformedIdentifier("CVE-BAD".to_string());
        assert_eq!(err.to_string(), "malformed identifier: CVE-BAD");

        let err = ConfigError::InvalidValue {
            field: "search.concurrent_sections".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for search.concurrent_sections: must be at least 1"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = DeltaError::Validation("search term must not be empty".to_string());
        assert_eq!(err.to_string(), "validation error: search term must not be empty");
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
