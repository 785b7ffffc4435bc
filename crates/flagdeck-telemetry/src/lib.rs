#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic)]

//! Telemetry primitives shared across the flagdeck workspace.
//!
//! The CLI is a short-lived process, so this crate only owns the tracing
//! subscriber bootstrap: diagnostics go to stderr and never interleave with
//! command output written to stdout.

pub mod error;
pub mod init;

pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LOG_FORMAT_ENV, LogFormat, LoggingConfig, VERBOSE_LOG_LEVEL, init_logging,
};
