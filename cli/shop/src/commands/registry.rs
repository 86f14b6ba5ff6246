//! Registry CLI commands: add, list, delete, init.

use std::fmt;

use anyhow::{Context as _, Result};
use serde::Serialize;
use shop_registry::{Registry, RegistryConfig, RegistryError, DEFAULT_REGISTRY};

use super::Context;

/// Run `shop registry add [-n name] [-a] [-w] <url>`.
///
/// The registry must already be initialized; its manifest name is used
/// when no name is given.
pub fn add(ctx: &Context, name: Option<&str>, admin: bool, write: bool, url: &str) -> Result<()> {
    let registry_config = RegistryConfig {
        url: url.to_string(),
        admin,
        write,
        ..Default::default()
    };
    let registry = Registry::open(registry_config.clone(), &ctx.backends)?;
    let manifest = registry
        .get_manifest()
        .with_context(|| format!("reading registry manifest at {url}"))?;
    let name = name.unwrap_or(&manifest.name);

    let mut config = ctx.load_config()?;
    config.add_registry(name, registry_config)?;
    if config.default_registry.is_none() {
        config.default_registry = Some(name.to_string());
    }
    ctx.save_config(&config)?;

    tracing::info!(name, url, "added registry");
    ctx.output.item(&manifest)
}

#[derive(Debug, Serialize)]
struct RegistryListItem {
    name: String,
    url: String,
    admin: bool,
    write: bool,
    default: bool,
}

impl fmt::Display for RegistryListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.default { '*' } else { ' ' };
        write!(f, "{marker} {} {}", self.name, self.url)?;
        if self.admin {
            write!(f, " +admin")?;
        }
        if self.write {
            write!(f, " +write")?;
        }
        Ok(())
    }
}

/// Run `shop registry list`.
pub fn list(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let default = config.default_registry.as_deref().unwrap_or(DEFAULT_REGISTRY);
    let items: Vec<_> = config
        .registry
        .iter()
        .map(|(name, registry)| RegistryListItem {
            name: name.clone(),
            url: registry.url.clone(),
            admin: registry.admin,
            write: registry.write,
            default: name == default,
        })
        .collect();
    ctx.output.list(&items)
}

/// Run `shop registry delete <name>`.
pub fn delete(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.load_config()?;
    config.remove_registry(name)?;
    ctx.save_config(&config)
}

/// Run `shop registry init -N <manifest-name> [-n name] <url>`.
///
/// Initializes a registry at `url` with admin access and records it in the
/// config under `name`, which defaults to the manifest name. An existing
/// config entry of that name is kept.
pub fn init(ctx: &Context, manifest_name: &str, name: Option<&str>, url: &str) -> Result<()> {
    let name = name.unwrap_or(manifest_name);
    let registry_config = RegistryConfig {
        url: url.to_string(),
        admin: true,
        write: true,
        ..Default::default()
    };

    let registry = Registry::open(registry_config.clone(), &ctx.backends)?;
    let manifest = registry
        .initialize(manifest_name)
        .with_context(|| format!("initializing registry at {url}"))?;

    let mut config = ctx.load_config()?;
    match config.add_registry(name, registry_config) {
        Ok(()) | Err(RegistryError::RegistryConfigExists(_)) => {}
        Err(e) => return Err(e.into()),
    }
    if config.default_registry.is_none() {
        config.default_registry = Some(name.to_string());
    }
    ctx.save_config(&config)?;

    ctx.output.item(&manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_text() {
        let item = RegistryListItem {
            name: "acme".into(),
            url: "file:///srv/acme".into(),
            admin: true,
            write: false,
            default: true,
        };
        assert_eq!(item.to_string(), "* acme file:///srv/acme +admin");
    }
}
