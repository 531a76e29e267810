use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tagcache")]
#[command(about = "tagcache CLI: inspect and invalidate a shared Redis cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./tagcache.toml when present)
    #[arg(short, long, global = true, env = "TAGCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server list, e.g. "Server=cache1:6379,cache2:6379" (overrides config)
    #[arg(short, long, global = true, env = "TAGCACHE_SERVERS")]
    pub servers: Option<String>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and report the server in use
    Status,
    /// Show the effective configuration
    Config,
    /// Read a cached value
    Get(KeyArgs),
    /// Remove a cached value
    Remove(KeyArgs),
    /// Evict every value registered under the given tags
    Evict(EvictArgs),
    /// Clear both databases and notify every instance
    Flush(FlushArgs),
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache key
    pub key: String,
    /// Cache name (default cache when omitted)
    #[arg(short = 'n', long)]
    pub cache_name: Option<String>,
}

#[derive(clap::Args)]
pub struct EvictArgs {
    /// Dependency tags
    #[arg(required = true)]
    pub tags: Vec<String>,
    /// Evict only values registered under all tags (default: any tag)
    #[arg(long)]
    pub all: bool,
    /// Cache name (default cache when omitted)
    #[arg(short = 'n', long)]
    pub cache_name: Option<String>,
}

#[derive(clap::Args)]
pub struct FlushArgs {
    /// Only publish the flushed event, leaving Redis untouched
    #[arg(long)]
    pub notify_only: bool,
    /// Confirm flushing the remote databases
    #[arg(long)]
    pub yes: bool,
}
