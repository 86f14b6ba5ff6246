//! Package CLI commands: ls, add, upload, instances, tags, refs, install.

use std::path::Path;

use anyhow::{bail, Context as _, Result};
use shop_registry::{
    install_package_instance, publish_directory, CursorExt, Package, PublishOptions,
    RegistryError,
};

use super::Context;

/// Parse a `key:value` tag argument.
pub fn parse_tag(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once(':') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected key:value, got {arg:?}")),
    }
}

/// Run `shop package ls [prefix]`.
pub fn list(ctx: &Context, registry: Option<&str>, prefix: &str) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    let items = registry.list_packages(prefix).collect_vec()?;
    ctx.output.list(&items)
}

/// Run `shop package add [-d description] [-R repo] <name>`.
pub fn add(
    ctx: &Context,
    registry: Option<&str>,
    name: &str,
    description: Option<String>,
    repo: Option<String>,
) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    if let Some(repo) = repo.as_deref() {
        if registry.repository(repo).is_none() {
            return Err(RegistryError::UnknownRepository(repo.to_string()).into());
        }
    }
    let package = registry.put_package(Package::new(name, description, repo)?)?;
    ctx.output.item(&package)
}

/// Run `shop package upload [-t key:value]... [--ref name]... <name> <dir>`.
pub fn upload(
    ctx: &Context,
    registry: Option<&str>,
    name: &str,
    dir: &Path,
    tags: Vec<(String, String)>,
    references: Vec<String>,
) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let registry = ctx.open_registry(registry)?;
    let options = PublishOptions { tags, references };
    let published = publish_directory(&registry, name, dir, &options)
        .with_context(|| format!("publishing {} as {name}", dir.display()))?;
    ctx.output.item(&published.instance)
}

/// Run `shop package instances <name>`.
pub fn instances(ctx: &Context, registry: Option<&str>, name: &str) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    let items = registry.list_instances(name).collect_vec()?;
    ctx.output.list(&items)
}

/// Run `shop package tags <name>`.
pub fn tags(ctx: &Context, registry: Option<&str>, name: &str) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    let items = registry.list_package_tags(name).collect_vec()?;
    ctx.output.list(&items)
}

/// Run `shop package refs <name>`.
pub fn refs(ctx: &Context, registry: Option<&str>, name: &str) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    let items = registry.list_references(name).collect_vec()?;
    ctx.output.list(&items)
}

/// Run `shop package install <name> <id> <dest>`.
pub fn install(ctx: &Context, registry: Option<&str>, name: &str, id: &str, dest: &Path) -> Result<()> {
    let registry = ctx.open_registry(registry)?;
    std::fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    install_package_instance(&registry, name, id, dest)?;
    println!("installed {name}@{id} into {}", dest.display());
    Ok(())
}
