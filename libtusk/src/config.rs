//! Configuration management for Tusk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::pagination::PageSizes;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub paging: PageSizes,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Host used when `tusk login` is called without one
    pub default: String,
    pub client_name: String,
    pub redirect_uri: String,
    pub website: Option<String>,
    pub scopes: Vec<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            default: "mastodon.social".to_string(),
            client_name: "Tusk".to_string(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            website: None,
            scopes: vec!["read".to_string(), "write".to_string(), "follow".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub storage: StorageBackend,
    /// Credential file, used by the file backend and as keyring fallback
    pub path: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Keyring,
            path: "~/.config/tusk/credentials.toml".to_string(),
        }
    }
}

impl CredentialConfig {
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub hide_content_warnings: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hide_content_warnings: true,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// A missing file is not an error: defaults are returned.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance.default.trim().is_empty() {
            return Err(ConfigError::MissingField("instance.default".to_string()).into());
        }
        for (field, size) in [
            ("paging.statuses", self.paging.statuses),
            ("paging.accounts", self.paging.accounts),
            ("paging.notifications", self.paging.notifications),
        ] {
            if size == 0 {
                return Err(
                    ConfigError::InvalidValue(field.to_string(), "must be at least 1".to_string())
                        .into(),
                );
            }
        }
        Ok(())
    }
}

/// Resolve the configuration file path.
///
/// `TUSK_CONFIG` wins over the XDG location.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TUSK_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tusk").join("config.toml"))
}
