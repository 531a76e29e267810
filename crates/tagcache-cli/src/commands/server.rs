use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tagcache_redis::{RedisCacheAdapter, RedisCacheConfig};

use crate::cli::OutputFormat;
use crate::output::print_value;

pub async fn status(adapter: &RedisCacheAdapter, format: OutputFormat) -> Result<()> {
    let mut errors = adapter.subscribe_errors();
    let connected = adapter.ensure_connected().await;
    let server = adapter.current_server();

    if matches!(format, OutputFormat::Json) {
        let mut last_error = None;
        while let Ok(e) = errors.try_recv() {
            last_error = Some(e.to_string());
        }
        print_value(
            &json!({
                "connected": connected,
                "state": adapter.state().to_string(),
                "server": server.map(|s| s.to_string()),
                "error": last_error,
            }),
            format,
        );
        return Ok(());
    }

    match server {
        Some(server) if connected => {
            println!(
                "{} {} is {}",
                "✓".green(),
                server.to_string().cyan(),
                "connected".green()
            );
        }
        _ => {
            println!("{} {}", "✗".red(), "no Redis server reachable".red());
            while let Ok(e) = errors.try_recv() {
                println!("  {e}");
            }
        }
    }
    Ok(())
}

pub fn config(config: &RedisCacheConfig, format: OutputFormat) -> Result<()> {
    let value = serde_json::to_value(config).context("failed to render configuration")?;
    print_value(&value, format);
    Ok(())
}
