//! CLI command implementations.

pub mod package;
pub mod registry;
pub mod repo;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use shop_registry::{BackendRegistry, Config, Registry};

use crate::output::Output;

/// State shared by every command: where the config lives and how to print.
pub struct Context {
    pub config_path: PathBuf,
    pub output: Output,
    pub backends: BackendRegistry,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, output: Output) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => Config::default_path()?,
        };
        Ok(Context {
            config_path,
            output,
            backends: BackendRegistry::with_defaults(),
        })
    }

    pub fn load_config(&self) -> Result<Config> {
        Ok(Config::load(&self.config_path)?)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        Ok(config.save(&self.config_path)?)
    }

    /// Open a configured registry, `None` meaning the default one.
    pub fn open_registry(&self, name: Option<&str>) -> Result<Registry> {
        let config = self.load_config()?;
        let (name, registry) = config.registry(name)?;
        Registry::open(registry.clone(), &self.backends)
            .with_context(|| format!("opening registry {name}"))
    }
}
