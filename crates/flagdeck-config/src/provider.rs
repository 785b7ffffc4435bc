//! Configuration providers consumed by the CLI middleware.
//!
//! # Design
//! - `ConfigProvider` is the narrow async contract the CLI depends on.
//! - `FileConfigProvider` persists pretty JSON and layers environment
//!   overrides on top of what it reads.
//! - `MemoryConfigProvider` keeps everything in process for tests and
//!   embedding.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use directories::ProjectDirs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{CliConfig, Credential};

/// Overrides the location of the configuration file.
pub const CONFIG_PATH_ENV: &str = "FLAGDECK_CONFIG";
/// Overrides the stored API host.
pub const API_HOST_ENV: &str = "FLAGDECK_API_HOST";
/// Overrides the stored API username (requires [`API_PASS_ENV`]).
pub const API_USER_ENV: &str = "FLAGDECK_API_USER";
/// Overrides the stored API password (requires [`API_USER_ENV`]).
pub const API_PASS_ENV: &str = "FLAGDECK_API_PASS";

const CONFIG_FILE_NAME: &str = "config.json";

#[async_trait]
/// Source of the persisted CLI configuration.
pub trait ConfigProvider: Send + Sync {
    /// Load the effective configuration.
    async fn get_config(&self) -> ConfigResult<CliConfig>;
    /// Persist the configuration for later invocations.
    async fn save_config(&self, config: &CliConfig) -> ConfigResult<()>;
}

/// File-backed configuration provider.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
    env_overrides: bool,
}

impl FileConfigProvider {
    /// Provider reading exactly the given file, without environment overrides.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_overrides: false,
        }
    }

    /// Provider for the default location with environment overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] when neither [`CONFIG_PATH_ENV`]
    /// nor a platform configuration directory is available.
    pub fn from_env() -> ConfigResult<Self> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => ProjectDirs::from("com", "flagdeck", "flagdeck")
                .ok_or(ConfigError::NoConfigDir)?
                .config_dir()
                .join(CONFIG_FILE_NAME),
        };
        Ok(Self {
            path,
            env_overrides: true,
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    #[instrument(name = "config.load", skip(self), fields(path = %self.path.display()))]
    async fn get_config(&self) -> ConfigResult<CliConfig> {
        let stored = match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                    path: self.path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no configuration file found, using defaults");
                CliConfig::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "read",
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if self.env_overrides {
            Ok(apply_overrides(stored, |name| std::env::var(name).ok()))
        } else {
            Ok(stored)
        }
    }

    #[instrument(name = "config.save", skip(self, config), fields(path = %self.path.display()))]
    async fn save_config(&self, config: &CliConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    operation: "create_dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let payload = serde_json::to_vec_pretty(config)
            .map_err(|source| ConfigError::Serialize { source })?;
        let io_error = |operation: &'static str| {
            let path = self.path.clone();
            move |source: std::io::Error| ConfigError::Io {
                operation,
                path,
                source,
            }
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // The file holds the credential; it is owner-only from creation on.
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await.map_err(io_error("open"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // An existing file keeps its previous mode when opened.
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(io_error("chmod"))?;
        }

        file.write_all(&payload).await.map_err(io_error("write"))?;
        file.flush().await.map_err(io_error("flush"))?;

        debug!("configuration saved");
        Ok(())
    }
}

/// In-memory configuration provider.
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: Mutex<CliConfig>,
}

impl MemoryConfigProvider {
    /// Provider seeded with the given configuration.
    #[must_use]
    pub fn new(config: CliConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Snapshot of the currently stored configuration.
    #[must_use]
    pub fn current(&self) -> CliConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn get_config(&self) -> ConfigResult<CliConfig> {
        Ok(self.current())
    }

    async fn save_config(&self, config: &CliConfig) -> ConfigResult<()> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}

/// Layer environment overrides on top of a stored configuration.
///
/// The credential is only replaced when both the user and password variables
/// are present and non-empty.
#[must_use]
pub fn apply_overrides(mut config: CliConfig, lookup: impl Fn(&str) -> Option<String>) -> CliConfig {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(host) = non_empty(API_HOST_ENV) {
        config.api_host = host;
    }
    if let (Some(username), Some(password)) = (non_empty(API_USER_ENV), non_empty(API_PASS_ENV)) {
        config.auth = Some(Credential::new(username, password));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let provider = FileConfigProvider::new(dir.path().join("absent.json"));
        assert_eq!(provider.get_config().await?, CliConfig::default());
        Ok(())
    }

    #[tokio::test]
    async fn saved_config_is_read_back() -> ConfigResult<()> {
        let dir = tempfile::tempdir().map_err(|source| ConfigError::Io {
            operation: "tempdir",
            path: PathBuf::new(),
            source,
        })?;
        let provider = FileConfigProvider::new(dir.path().join("nested").join("config.json"));
        let config = CliConfig {
            api_host: "https://api.example.com/".into(),
            auth: Some(Credential::new("user", "pass")),
        };

        provider.save_config(&config).await?;
        assert_eq!(provider.get_config().await?, config);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_config_is_owner_only() -> ConfigResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{}").expect("write fixture");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .expect("loosen fixture");

        FileConfigProvider::new(&path)
            .save_config(&CliConfig {
                auth: Some(Credential::new("user", "pass")),
                ..CliConfig::default()
            })
            .await?;

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let fresh = dir.path().join("fresh").join("config.json");
        FileConfigProvider::new(&fresh)
            .save_config(&CliConfig::default())
            .await?;
        let mode = std::fs::metadata(&fresh).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"{not json").expect("write fixture");

        let err = FileConfigProvider::new(&path)
            .get_config()
            .await
            .expect_err("parse failure expected");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_replace_host_and_credential() {
        let config = apply_overrides(
            CliConfig::default(),
            lookup_from(&[
                (API_HOST_ENV, "https://override.example/"),
                (API_USER_ENV, "env-user"),
                (API_PASS_ENV, "env-pass"),
            ]),
        );
        assert_eq!(config.api_host, "https://override.example/");
        assert_eq!(config.auth, Some(Credential::new("env-user", "env-pass")));
    }

    #[test]
    fn partial_credential_override_is_ignored() {
        let stored = CliConfig {
            auth: Some(Credential::new("stored", "secret")),
            ..CliConfig::default()
        };
        let config = apply_overrides(stored.clone(), lookup_from(&[(API_USER_ENV, "env-user")]));
        assert_eq!(config, stored);
    }

    #[tokio::test]
    async fn memory_provider_round_trips() -> ConfigResult<()> {
        let provider = MemoryConfigProvider::default();
        let config = CliConfig {
            auth: Some(Credential::new("a", "b")),
            ..CliConfig::default()
        };
        provider.save_config(&config).await?;
        assert_eq!(provider.get_config().await?, config);
        assert_eq!(provider.current(), config);
        Ok(())
    }
}
