//! Repository CLI commands: init, add.

use anyhow::{Context as _, Result};
use shop_registry::{Repository, RepositoryConfig};

use super::Context;

/// Run `shop repo init -n <name> [--ro-url <url>] <url>`.
pub fn init(ctx: &Context, name: &str, readonly_url: Option<&str>, url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("invalid repository url {url}"))?;
    if let Some(mirror) = readonly_url {
        url::Url::parse(mirror).with_context(|| format!("invalid read-only url {mirror}"))?;
    }

    let config = RepositoryConfig {
        url: url.to_string(),
        write: true,
        admin: true,
    };
    let repository = Repository::open(config, &ctx.backends)?;
    let manifest = repository.initialize(name, readonly_url.map(str::to_string))?;
    ctx.output.item(&manifest)
}

/// Run `shop repo add [-r registry] -n <name> <url>`.
pub fn add(ctx: &Context, registry: Option<&str>, name: &str, url: &str) -> Result<()> {
    let mut registry = ctx.open_registry(registry)?;
    let manifest = registry
        .add_repository(name, RepositoryConfig::new(url), &ctx.backends)
        .with_context(|| format!("adding repository {name}"))?;
    ctx.output.item(&manifest)
}
