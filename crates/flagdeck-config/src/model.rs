//! Typed configuration persisted between CLI invocations.

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Management API host used when nothing else is configured.
pub const DEFAULT_API_HOST: &str = "https://api.configcat.com/";

/// Basic-auth credential for the management API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// API username.
    pub username: String,
    /// API password.
    pub password: String,
}

impl Credential {
    /// Build a credential from its components.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value for the `Authorization` request header.
    #[must_use]
    pub fn header_value(&self) -> String {
        let raw = format!("{}:{}", self.username, self.password);
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration document stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Base URL of the management API.
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Stored credential, if setup has been completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Credential>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            auth: None,
        }
    }
}

impl CliConfig {
    /// Parse the API host into a base URL suitable for joining relative paths.
    ///
    /// A missing scheme defaults to `https` and a trailing slash is appended so
    /// `v1/...` paths resolve beneath the host rather than replacing its last
    /// segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiHost`] when the host cannot be parsed.
    pub fn api_url(&self) -> ConfigResult<Url> {
        normalize_api_host(&self.api_host)
    }
}

/// Normalise a user-supplied API host into a base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidApiHost`] when the host cannot be parsed.
pub fn normalize_api_host(raw: &str) -> ConfigResult<Url> {
    let trimmed = raw.trim();
    let mut candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    if !candidate.ends_with('/') {
        candidate.push('/');
    }
    Url::parse(&candidate).map_err(|source| ConfigError::InvalidApiHost {
        value: raw.to_string(),
        source,
    })
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}
