//! Client configuration, stored as TOML.
//!
//! ```toml
//! default_registry = "acme"
//!
//! [registry.acme]
//! url = "file:///srv/acme"
//! admin = true
//!
//! [registry.acme.repo.blobs]
//! url = "file:///srv/acme-blobs"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Name used when no registry is given and no default is configured.
pub const DEFAULT_REGISTRY: &str = "default";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Access to one storage location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub admin: bool,
}

impl RepositoryConfig {
    pub fn new(url: &str) -> Self {
        RepositoryConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Whether mutating calls are allowed. Admin implies write.
    pub fn can_write(&self) -> bool {
        self.write || self.admin
    }

    /// This config with the registry's permissions folded in.
    pub fn inherit(&self, write: bool, admin: bool) -> RepositoryConfig {
        let admin = self.admin || admin;
        RepositoryConfig {
            url: self.url.clone(),
            write: self.write || write || admin,
            admin,
        }
    }
}

/// Access to one registry: a root repository plus named secondaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "is_default_repo")]
    pub root_repository: RepositoryConfig,
    /// Overrides for secondary repositories, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repo: BTreeMap<String, RepositoryConfig>,
}

fn is_default_repo(repo: &RepositoryConfig) -> bool {
    *repo == RepositoryConfig::default()
}

impl RegistryConfig {
    pub fn new(url: &str) -> Self {
        RegistryConfig {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn can_write(&self) -> bool {
        self.write || self.admin
    }

    /// The root repository config: `url` when none is set, with this
    /// registry's permissions folded in.
    pub fn root_repository(&self) -> RepositoryConfig {
        let mut root = self.root_repository.inherit(self.write, self.admin);
        if root.url.is_empty() {
            root.url = self.url.clone();
        }
        root
    }

    /// Config for the secondary repository `name` at `url`. A configured
    /// override for `name` supplies extra permissions, and its URL when set.
    pub fn secondary_repository(&self, name: &str, url: &str) -> RepositoryConfig {
        let mut repo = self
            .repo
            .get(name)
            .cloned()
            .unwrap_or_default()
            .inherit(self.write, self.admin);
        if repo.url.is_empty() {
            repo.url = url.to_string();
        }
        repo
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_registry: Option<String>,
    /// Local cache directory, reserved for fetched archives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
    #[serde(default)]
    pub registry: BTreeMap<String, RegistryConfig>,
}

impl Config {
    /// `$XDG_CONFIG_HOME/shop/config.toml` or the platform equivalent.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("shop").join("config.toml"))
            .ok_or_else(|| RegistryError::Config {
                path: PathBuf::from("config.toml"),
                detail: "no configuration directory on this platform".to_string(),
            })
    }

    /// Load a config file. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Config> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(RegistryError::Config {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        };
        Self::parse(&text).map_err(|detail| RegistryError::Config {
            path: path.to_path_buf(),
            detail,
        })
    }

    fn parse(text: &str) -> std::result::Result<Config, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_error = |detail: String| RegistryError::Config {
            path: path.to_path_buf(),
            detail,
        };
        let text = toml::to_string_pretty(self).map_err(|e| config_error(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| config_error(e.to_string()))?;
        }
        fs::write(path, text).map_err(|e| config_error(e.to_string()))?;
        tracing::debug!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn add_registry(&mut self, name: &str, registry: RegistryConfig) -> Result<()> {
        if self.registry.contains_key(name) {
            return Err(RegistryError::RegistryConfigExists(name.to_string()));
        }
        self.registry.insert(name.to_string(), registry);
        Ok(())
    }

    pub fn remove_registry(&mut self, name: &str) -> Result<RegistryConfig> {
        let removed = self
            .registry
            .remove(name)
            .ok_or_else(|| RegistryError::not_found(format!("registry {name}")))?;
        if self.default_registry.as_deref() == Some(name) {
            self.default_registry = None;
        }
        Ok(removed)
    }

    /// Resolve a registry by name, falling back to `default_registry` and
    /// then to `"default"`.
    pub fn registry(&self, name: Option<&str>) -> Result<(&str, &RegistryConfig)> {
        let name = name
            .or(self.default_registry.as_deref())
            .unwrap_or(DEFAULT_REGISTRY);
        self.registry
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| RegistryError::not_found(format!("registry {name}")))
    }
}
