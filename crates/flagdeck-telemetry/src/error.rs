//! Errors raised while bootstrapping logging.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Logging bootstrap failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The requested level is not a valid filter directive.
    #[error("invalid log level")]
    InvalidLevel {
        /// Level string as supplied.
        level: String,
        /// Directive parse failure.
        #[source]
        source: ParseError,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: TryInitError,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use tracing_subscriber::EnvFilter;

    use super::*;

    #[test]
    fn invalid_level_keeps_the_parse_failure() {
        let source = EnvFilter::try_new("flagdeck=loud").expect_err("malformed directive");
        let err = TelemetryError::InvalidLevel {
            level: "flagdeck=loud".into(),
            source,
        };
        assert_eq!(err.to_string(), "invalid log level");
        assert!(err.source().is_some());
    }
}
