//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory could be determined.
    #[error("could not determine the configuration directory")]
    NoConfigDir,
    /// The configured API host is not a valid URL.
    #[error("invalid API host")]
    InvalidApiHost {
        /// Host value provided by the user.
        value: String,
        /// Underlying URL parse error.
        source: url::ParseError,
    },
    /// Stored configuration could not be parsed.
    #[error("configuration file is not valid JSON")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// Configuration could not be serialised.
    #[error("failed to serialize configuration")]
    Serialize {
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn config_error_display_is_constant_and_keeps_source() {
        let err = ConfigError::Io {
            operation: "read",
            path: PathBuf::from("/tmp/config.json"),
            source: io::Error::other("denied"),
        };
        assert_eq!(err.to_string(), "filesystem operation failed");
        assert!(err.source().is_some());

        let err = ConfigError::NoConfigDir;
        assert!(err.source().is_none());
    }
}
