#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Persisted configuration for the flagdeck CLI.
//!
//! Layout: `model.rs` (typed config and credential), `provider.rs`
//! (`ConfigProvider` contract, file-backed and in-memory implementations),
//! `error.rs` (`ConfigError`).

pub mod error;
pub mod model;
pub mod provider;

pub use error::{ConfigError, ConfigResult};
pub use model::{CliConfig, Credential, DEFAULT_API_HOST};
pub use provider::{
    API_HOST_ENV, API_PASS_ENV, API_USER_ENV, CONFIG_PATH_ENV, ConfigProvider,
    FileConfigProvider, MemoryConfigProvider, apply_overrides,
};
