//! `tempid` - resolve temp-IDs from the command line and inspect the
//! persistent cache.

#![allow(clippy::print_stdout, reason = "CLI tool outputs to stdout")]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tempid_core::{load_config, open_cache, ResolutionEngine};
use tempid_types::{EngineConfig, Subject, TempKey};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG: &str = "tempid.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (JSON); defaults apply when it is missing
    #[arg(short, long, env = "TEMPID_CONFIG", default_value = DEFAULT_CONFIG, global = true)]
    config: PathBuf,

    /// Enables debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolves `subject:key` pairs and prints the values
    Resolve {
        /// Pairs to resolve, e.g. `name:a1b2c3`
        #[arg(required = true, value_parser = parse_pair)]
        pairs: Vec<(Subject, TempKey)>,
    },
    /// Inspects or edits the persistent cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Prints the number of cached values
    ShowSize,
    /// Drops a cached key, under one subject or under all of them
    Invalidate {
        /// Restricts invalidation to this subject
        #[arg(long)]
        subject: Option<String>,
        /// The temp-ID to drop
        key: String,
    },
    /// Drops every cached value and its session storage entries
    Clear,
}

/// Parses `subject:key`. The key may itself contain colons.
fn parse_pair(s: &str) -> Result<(Subject, TempKey), String> {
    match s.split_once(':') {
        Some((subject, key)) if !subject.is_empty() && !key.is_empty() => {
            Ok((Subject::from(subject), TempKey::from(key)))
        },
        _ => Err(format!("expected subject:key, got {s:?}")),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

async fn resolve(config: &EngineConfig, pairs: Vec<(Subject, TempKey)>) -> Result<()> {
    let engine = ResolutionEngine::from_config(config).context("Failed to build engine")?;
    let resolved = engine.resolve_all(pairs.iter().cloned()).await;

    for pair in &pairs {
        let (subject, key) = pair;
        match resolved.get(pair) {
            Some(value) => println!("{subject}:{key}\t{value}"),
            None => println!("{subject}:{key}\t<unresolved>"),
        }
    }
    info!("Resolved {} of {} pair(s)", resolved.len(), pairs.len());
    Ok(())
}

fn cache_command(config: &EngineConfig, command: CacheCommands) -> Result<()> {
    let mut cache_config = config.cache.clone();
    cache_config.persistent = true;
    let cache = open_cache(&cache_config).context("Failed to open persistent cache")?;

    match command {
        CacheCommands::ShowSize => println!("{}", cache.len()),
        CacheCommands::Invalidate { subject, key } => {
            let subject = subject.map(Subject::from);
            let before = cache.len();
            cache.clear_value(subject.as_ref(), &TempKey::from(key.as_str()));
            info!("Invalidated {key}, {} value(s) dropped", before.saturating_sub(cache.len()));
        },
        CacheCommands::Clear => {
            let dropped = cache.len();
            cache.clear();
            info!("Cleared cache, {dropped} value(s) dropped");
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    match cli.command {
        Commands::Resolve { pairs } => resolve(&config, pairs).await,
        Commands::Cache { command } => cache_command(&config, command),
    }
}
