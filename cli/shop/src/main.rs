//! shop: command-line client for the serverless package registry.

mod commands;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Context;
use output::{Format, Output};

#[derive(Parser)]
#[command(name = "shop", version, about = "Serverless package registry")]
struct Cli {
    /// Config file (default: <config dir>/shop/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value_t = Format::Text)]
    output: Format,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configured registries
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Manage repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
    /// Manage packages
    Package {
        /// Registry to operate on (default: the configured default)
        #[arg(short, long, global = true)]
        registry: Option<String>,
        #[command(subcommand)]
        action: PackageAction,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// Add an initialized registry to the configuration
    Add {
        /// Name in the configuration (default: the manifest name)
        #[arg(short, long)]
        name: Option<String>,
        /// Enable administration commands
        #[arg(short, long)]
        admin: bool,
        /// Enable write commands
        #[arg(short, long)]
        write: bool,
        url: String,
    },
    /// List configured registries
    List,
    /// Remove a registry from the configuration
    Delete { name: String },
    /// Initialize a new registry and add it to the configuration
    Init {
        /// Name recorded in the registry manifest
        #[arg(short = 'N', long)]
        manifest_name: String,
        /// Name in the configuration (default: the manifest name)
        #[arg(short, long)]
        name: Option<String>,
        url: String,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Write a repository manifest
    Init {
        /// Name recorded in the repository manifest
        #[arg(short, long)]
        name: String,
        /// Read-only mirror URL (typically http)
        #[arg(long)]
        ro_url: Option<String>,
        url: String,
    },
    /// Register a repository with a registry
    Add {
        /// Registry to operate on
        #[arg(short, long)]
        registry: Option<String>,
        /// Name of the repository in the registry manifest
        #[arg(short, long)]
        name: String,
        url: String,
    },
}

#[derive(Subcommand)]
enum PackageAction {
    /// List packages under a prefix
    Ls {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Create or update a package
    Add {
        #[arg(short, long)]
        description: Option<String>,
        /// Repository holding the package's archives
        #[arg(short = 'R', long)]
        repo: Option<String>,
        name: String,
    },
    /// Archive a directory and upload it as a new instance
    Upload {
        /// Tag to attach, as key:value
        #[arg(short, long = "tag", value_parser = commands::package::parse_tag)]
        tags: Vec<(String, String)>,
        /// Reference to point at the new instance
        #[arg(short = 'R', long = "ref")]
        refs: Vec<String>,
        name: String,
        dir: PathBuf,
    },
    /// List committed instances
    Instances { name: String },
    /// List tag keys in use
    Tags { name: String },
    /// List references
    Refs { name: String },
    /// Download and unpack an instance
    Install {
        name: String,
        id: String,
        dest: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::new(cli.config, Output::new(cli.output))?;

    match cli.command {
        Commands::Registry { action } => match action {
            RegistryAction::Add {
                name,
                admin,
                write,
                url,
            } => commands::registry::add(&ctx, name.as_deref(), admin, write, &url),
            RegistryAction::List => commands::registry::list(&ctx),
            RegistryAction::Delete { name } => commands::registry::delete(&ctx, &name),
            RegistryAction::Init {
                manifest_name,
                name,
                url,
            } => commands::registry::init(&ctx, &manifest_name, name.as_deref(), &url),
        },

        Commands::Repo { action } => match action {
            RepoAction::Init { name, ro_url, url } => {
                commands::repo::init(&ctx, &name, ro_url.as_deref(), &url)
            }
            RepoAction::Add {
                registry,
                name,
                url,
            } => commands::repo::add(&ctx, registry.as_deref(), &name, &url),
        },

        Commands::Package { registry, action } => {
            let registry = registry.as_deref();
            match action {
                PackageAction::Ls { prefix } => commands::package::list(&ctx, registry, &prefix),
                PackageAction::Add {
                    description,
                    repo,
                    name,
                } => commands::package::add(&ctx, registry, &name, description, repo),
                PackageAction::Upload {
                    tags,
                    refs,
                    name,
                    dir,
                } => commands::package::upload(&ctx, registry, &name, &dir, tags, refs),
                PackageAction::Instances { name } => {
                    commands::package::instances(&ctx, registry, &name)
                }
                PackageAction::Tags { name } => commands::package::tags(&ctx, registry, &name),
                PackageAction::Refs { name } => commands::package::refs(&ctx, registry, &name),
                PackageAction::Install { name, id, dest } => {
                    commands::package::install(&ctx, registry, &name, &id, &dest)
                }
            }
        }
    }
}
