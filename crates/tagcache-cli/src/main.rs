mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use tagcache_redis::{RedisCacheAdapter, RedisCacheConfig, load_config, parse_server_list};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);
    let format = cli.format.unwrap_or_default();
    let config = resolve_config(&cli)?;

    if let Commands::Config = cli.command {
        return commands::server::config(&config, format);
    }

    let adapter = RedisCacheAdapter::new(config).context("invalid Redis cache configuration")?;
    let result = match &cli.command {
        Commands::Status => commands::server::status(&adapter, format).await,
        Commands::Get(args) => commands::keys::get(&adapter, args, format).await,
        Commands::Remove(args) => commands::keys::remove(&adapter, args).await,
        Commands::Evict(args) => commands::keys::evict(&adapter, args).await,
        Commands::Flush(args) => commands::flush::flush(&adapter, args).await,
        Commands::Config => Ok(()),
    };
    adapter.dispose();
    result
}

fn resolve_config(cli: &Cli) -> Result<RedisCacheConfig> {
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(servers) = &cli.servers {
        config.servers = parse_server_list(servers).context("invalid --servers")?;
    }
    Ok(config)
}
