#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Command-line client for the feature-flag management API.
//!
//! Layout:
//! - `tree.rs`: declarative command descriptors and tree assembly
//! - `commands/`: one descriptor plus handlers per command
//! - `middleware.rs`: ordered steps run before every handler
//! - `context.rs`: per-invocation state shared with handlers
//! - `pipeline.rs`: retrying, cancellable request execution
//! - `api/`: resource clients on top of the pipeline
//! - `cancel.rs`: interrupt-driven cancellation signal
//! - `error.rs`: error taxonomy and the top-level reporter
//! - `output.rs`: output sinks and renderers
//! - `cli.rs`: entry points returning the exit code
//! - `main.rs`: thin binary delegating to `run()`

pub mod api;
pub mod cancel;
pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod middleware;
pub mod output;
pub mod pipeline;
pub mod tree;

pub use cli::{Runtime, run, run_with};
