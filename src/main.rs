use anyhow::{Context, Result};
use clap::Parser as _;
use serde::Serialize;
use std::path::{Path, PathBuf};

use rss_feed::config::Config;
use rss_feed::feed::{Parser, Post, Source};

/// Get the default config file path (~/.config/rss-feed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("rss-feed")
        .join("config.toml"))
}

#[derive(clap::Parser, Debug)]
#[command(name = "rss-feed", about = "Discover, fetch and parse RSS/Atom feeds")]
struct Args {
    /// Config file (defaults to ~/.config/rss-feed/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Resolve a URL to its feed URL (follows redirects and auto-discovery)
    Check { url: String },
    /// Load one feed and print its source and posts as JSON
    Load { url: String },
    /// Load every visible source in a JSON array and print the merged posts
    LoadAll {
        #[arg(value_name = "SOURCES_JSON")]
        sources: PathBuf,
    },
}

#[derive(Serialize)]
struct LoadOutput<'a> {
    source: &'a Source,
    posts: &'a [Post],
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    Config::load(&path).with_context(|| format!("Failed to load config '{}'", path.display()))
}

fn read_sources(path: &Path) -> Result<Vec<Source>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid sources JSON in '{}'", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let mut parser = Parser::new(config).context("Failed to initialize HTTP client")?;

    match args.command {
        Command::Check { url } => {
            let mut source = Source::new(url);
            if !parser.is_valid(&mut source).await {
                eprintln!("No RSS or Atom feed found at {}", source.url);
                std::process::exit(1);
            }
            println!("{}", source.url);
        }
        Command::Load { url } => {
            parser.load(&url).await;
            let Some(source) = parser.source() else {
                eprintln!("Failed to load a feed from {url}");
                std::process::exit(1);
            };
            print_json(&LoadOutput {
                source,
                posts: parser.posts(),
            })?;
        }
        Command::LoadAll { sources } => {
            let sources = read_sources(&sources)?;
            let posts = parser.load_multiple(&sources).await;
            tracing::info!(sources = sources.len(), posts = posts.len(), "Loaded sources");
            print_json(&posts)?;
        }
    }

    Ok(())
}
