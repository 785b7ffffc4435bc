//! CLI error taxonomy and the top-level handler translating errors into
//! user-facing text and exit codes.

use std::fmt::{self, Display, Formatter};

use flagdeck_config::ConfigError;
use tracing::debug;

use crate::output::OutputSink;
use crate::pipeline::{FailureKind, PipelineError};
use crate::tree::TreeError;

/// Exit code for a successful invocation.
pub const EXIT_OK: i32 = 0;
/// Exit code for every failure path.
pub const EXIT_ERROR: i32 = 1;

/// CLI-level error type.
#[derive(Debug)]
pub enum CliError {
    /// The invocation was interrupted.
    Cancelled,
    /// An HTTP call failed after classification by the pipeline.
    Pipeline(PipelineError),
    /// The command tree could not be assembled.
    Tree(TreeError),
    /// The selected command cannot run as invoked; help is shown instead.
    Configuration {
        /// What is wrong with the invocation.
        message: String,
        /// Rendered help for the offending command.
        help: String,
    },
    /// User input was rejected before any request was sent.
    Validation(String),
    /// Catch-all for everything else.
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Generic failure wrapping any error.
    pub fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Exit code reported for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        EXIT_ERROR
    }

    /// Message shown to the user; `verbose` adds underlying detail.
    #[must_use]
    pub fn display_message(&self, verbose: bool) -> String {
        match self {
            Self::Cancelled | Self::Pipeline(PipelineError::Cancelled) => "Terminated.".to_string(),
            Self::Pipeline(PipelineError::HttpStatus {
                status,
                reason,
                detail,
            }) => {
                let mut message = http_failure(status.as_u16(), reason);
                if let (true, Some(detail)) = (verbose, detail) {
                    message.push('\n');
                    message.push_str(detail);
                }
                message
            }
            Self::Pipeline(PipelineError::RetryExhausted { last_failure, .. }) => {
                match last_failure.as_ref() {
                    FailureKind::Status { status, reason, .. } => {
                        http_failure(status.as_u16(), reason)
                    }
                    FailureKind::Transport(err) => error_chain(err, verbose),
                }
            }
            Self::Pipeline(err) => error_chain(err, verbose),
            Self::Tree(err) => format!("Invalid command tree: {}", error_chain(err, verbose)),
            Self::Configuration { message, .. } | Self::Validation(message) => message.clone(),
            Self::Failure(error) => {
                if verbose {
                    format!("{error:?}")
                } else {
                    format!("{error:#}")
                }
            }
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Cancelled => "operation cancelled",
            Self::Pipeline(_) => "request failed",
            Self::Tree(_) => "invalid command tree",
            Self::Configuration { .. } => "command cannot be run as invoked",
            Self::Validation(_) => "invalid input",
            Self::Failure(_) => "command failed",
        })
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pipeline(err) => Some(err),
            Self::Tree(err) => Some(err),
            Self::Failure(err) => Some(&**err),
            Self::Cancelled | Self::Configuration { .. } | Self::Validation(_) => None,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => Self::Cancelled,
            other => Self::Pipeline(other),
        }
    }
}

impl From<TreeError> for CliError {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Failure(anyhow::Error::new(err))
    }
}

/// Report an error through the output sink and return the exit code.
///
/// This is the only place error text is formatted for the user.
pub fn report(err: &CliError, output: &dyn OutputSink) -> i32 {
    let verbose = output.is_verbose();
    debug!(error = %err, "invocation failed");

    output.error(&err.display_message(verbose));
    if let CliError::Configuration { help, .. } = err {
        output.error("");
        output.error(help.trim_end());
    }
    err.exit_code()
}

fn http_failure(status: u16, reason: &str) -> String {
    format!("Http request failed: {status} {reason}.")
}

fn error_chain(err: &(dyn std::error::Error + 'static), verbose: bool) -> String {
    let mut message = err.to_string();
    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use crate::pipeline::TransportError;
    use reqwest::StatusCode;

    #[test]
    fn cancellation_reports_terminated() {
        let output = BufferedOutput::new();
        let code = report(&CliError::from(PipelineError::Cancelled), &output);
        assert_eq!(code, EXIT_ERROR);
        assert_eq!(output.stderr(), "Terminated.\n");
    }

    #[test]
    fn http_status_reports_code_and_reason() {
        let err = CliError::from(PipelineError::HttpStatus {
            status: StatusCode::NOT_FOUND,
            reason: "Not Found".into(),
            detail: Some("Tag does not exist.".into()),
        });
        assert_eq!(err.display_message(false), "Http request failed: 404 Not Found.");
        assert_eq!(
            err.display_message(true),
            "Http request failed: 404 Not Found.\nTag does not exist."
        );
    }

    #[test]
    fn exhausted_retries_report_last_response() {
        let err = CliError::from(PipelineError::RetryExhausted {
            attempts: 3,
            last_failure: Box::new(FailureKind::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                reason: "Internal Server Error".into(),
                detail: None,
            }),
        });
        assert_eq!(
            err.display_message(false),
            "Http request failed: 500 Internal Server Error."
        );
        assert_eq!(err.exit_code(), EXIT_ERROR);
    }

    #[test]
    fn exhausted_retries_report_transport_failure() {
        let err = CliError::from(PipelineError::RetryExhausted {
            attempts: 3,
            last_failure: Box::new(FailureKind::Transport(TransportError::new(
                "request to https://api.example.com/ failed",
            ))),
        });
        assert_eq!(
            err.display_message(false),
            "request to https://api.example.com/ failed"
        );
    }

    #[test]
    fn configuration_error_prints_help() {
        let output = BufferedOutput::new();
        let err = CliError::Configuration {
            message: "'flag' requires a subcommand.".into(),
            help: "Usage: flagdeck flag <COMMAND>\n".into(),
        };
        report(&err, &output);
        assert_eq!(
            output.stderr(),
            "'flag' requires a subcommand.\n\nUsage: flagdeck flag <COMMAND>\n"
        );
    }

    #[test]
    fn failure_detail_depends_on_verbosity() {
        let err = CliError::failure(anyhow::anyhow!("inner").context("outer"));
        assert_eq!(err.display_message(false), "outer: inner");
        assert!(err.display_message(true).contains("Caused by"));
    }
}
