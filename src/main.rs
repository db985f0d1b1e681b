use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

use rainfeeds::config::{Config, ConfigError};
use rainfeeds::feed::HttpFeedSource;
use rainfeeds::raindrop::RaindropClient;
use rainfeeds::store::{import_file, CategoryUpdate, StoreError, SubscriptionStore};
use rainfeeds::sync::SyncEngine;

const TOKEN_ENV: &str = "RAINDROP_ACCESS_TOKEN";

/// Get the config directory path (~/.config/rainfeeds/)
fn get_config_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::NoConfigDir)?;
    Ok(PathBuf::from(home).join(".config").join("rainfeeds"))
}

#[derive(Parser, Debug)]
#[command(
    name = "rainfeeds",
    version,
    about = "Send entries from RSS and Atom feeds to Raindrop"
)]
struct Args {
    /// Subscription file (default: ~/.config/rainfeeds/feeds.opml)
    #[arg(long, global = true, value_name = "FILE")]
    feeds: Option<PathBuf>,

    /// Config file (default: ~/.config/rainfeeds/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List feeds
    Ls,

    /// Add a new feed
    Add {
        /// URL of the RSS/Atom feed
        url: String,
        /// Title of the feed
        #[arg(short, long)]
        title: Option<String>,
        /// Category of the feed
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Remove a feed
    Rm {
        /// URL of the RSS/Atom feed
        url: String,
    },

    /// Edit a feed
    Edit {
        /// URL of the RSS/Atom feed
        url: String,
        /// New title of the feed
        #[arg(short, long)]
        title: Option<String>,
        /// New category of the feed (leave empty to remove)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Synchronise new entries to Raindrop
    Sync,

    /// Replace the subscription file with an existing OPML file
    Import {
        /// OPML file to import
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (config, feeds_path) =
        Config::load_with_overrides(args.config.as_deref(), args.feeds.as_deref(), get_config_dir)
            .context("Failed to load configuration")?;

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("rainfeeds/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    match args.command {
        Command::Ls => {
            let store = load_store(&feeds_path)?;
            tracing::debug!("Listing feeds in subscription data");
            for row in store.list() {
                println!("{} [{}]\n  {}\n", row.title, row.category, row.url);
            }
        }
        Command::Add {
            url,
            title,
            category,
        } => {
            let mut store = load_store(&feeds_path)?;
            let source = HttpFeedSource::new(client).with_timeout(config.request_timeout());
            let added = store.add(&source, &url, title, category).await;
            if report_user_error(added)?.is_some() {
                store.save(&feeds_path)?;
            }
        }
        Command::Rm { url } => {
            let mut store = load_store(&feeds_path)?;
            if report_user_error(store.remove(&url))?.is_some() {
                store.save(&feeds_path)?;
            }
        }
        Command::Edit {
            url,
            title,
            category,
        } => {
            let mut store = load_store(&feeds_path)?;
            let edited = store
                .edit(&url, title, CategoryUpdate::from_arg(category))
                .map(|_| ());
            if report_user_error(edited)?.is_some() {
                store.save(&feeds_path)?;
            }
        }
        Command::Sync => synchronise(&config, client, &feeds_path).await?,
        Command::Import { file } => import(&file, &feeds_path)?,
    }

    Ok(())
}

async fn synchronise(config: &Config, client: reqwest::Client, feeds_path: &Path) -> Result<()> {
    let token = match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => SecretString::from(token),
        _ => {
            tracing::error!("{TOKEN_ENV} environment variable is not set");
            eprintln!("Error: {TOKEN_ENV} environment variable is not set.");
            std::process::exit(1);
        }
    };

    tracing::info!("Loading subscription data");
    let mut store = load_store(feeds_path)?;

    tracing::info!("Initialising Raindrop client");
    let api = RaindropClient::new(client.clone(), &config.api_base_url, token)
        .context("Failed to create Raindrop client")?
        .with_timeout(config.request_timeout());
    let source = HttpFeedSource::new(client).with_timeout(config.request_timeout());

    let engine = SyncEngine::connect(&source, &api, &config.group)
        .await
        .with_context(|| {
            format!(
                "Failed to resolve Raindrop collections for group \"{}\"",
                config.group
            )
        })?;

    let report = engine.run(&mut store).await;

    if report.has_updates() {
        store
            .save(feeds_path)
            .context("Failed to save updated watermarks")?;
    }

    tracing::info!(summary = %report, "Sync finished");
    Ok(())
}

fn import(file: &Path, feeds_path: &Path) -> Result<()> {
    if let Some(dir) = feeds_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            restrict_permissions(dir);
        }
    }

    let outcome = import_file(file, feeds_path)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    if let Some(backup) = &outcome.backup {
        println!("Backed up existing OPML to: {}", backup.display());
    }
    println!(
        "Imported {} feeds to: {}",
        outcome.feeds,
        feeds_path.display()
    );
    Ok(())
}

/// Set directory permissions on Unix (user-only access)
fn restrict_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set directory permissions to 0700"
            );
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

fn load_store(path: &Path) -> Result<SubscriptionStore> {
    match SubscriptionStore::load(path) {
        Ok(store) => Ok(store),
        Err(StoreError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("Error: No feeds file found at {}", path.display());
            eprintln!();
            eprintln!("To get started, import your OPML file:");
            eprintln!("  rainfeeds import /path/to/your/feeds.opml");
            std::process::exit(1);
        }
        Err(e) => Err(e).context("Failed to load subscription data"),
    }
}

/// Prints refusals such as "Feed already exists." and carries on; any other
/// error is fatal.
fn report_user_error<T>(result: Result<T, StoreError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_user_error() => {
            match std::error::Error::source(&e) {
                Some(cause) => tracing::debug!(error = %e, cause = %cause, "Operation refused"),
                None => tracing::debug!(error = %e, "Operation refused"),
            }
            println!("{e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
