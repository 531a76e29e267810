use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::{Value, json};
use tagcache_core::{CacheAdapter, CachedValue};
use tagcache_redis::RedisCacheAdapter;

use crate::cli::{EvictArgs, KeyArgs, OutputFormat};
use crate::output::{print_success, print_value, print_warning};

/// Render a cached value. MessagePack payloads are shown as JSON, anything
/// else as its raw byte length.
fn describe(value: &CachedValue) -> Value {
    match value {
        CachedValue::Null => Value::Null,
        CachedValue::Bytes(bytes) => value
            .decode::<Value>()
            .unwrap_or_else(|_| json!({ "raw_bytes": bytes.len() })),
    }
}

async fn require_connection(adapter: &RedisCacheAdapter) -> Result<()> {
    if !adapter.ensure_connected().await {
        bail!("no Redis server reachable ({} configured)", adapter.config().servers.len());
    }
    Ok(())
}

pub async fn get(adapter: &RedisCacheAdapter, args: &KeyArgs, format: OutputFormat) -> Result<()> {
    require_connection(adapter).await?;

    match adapter.get(&args.key, args.cache_name.as_deref()).await {
        Some(value) => match format {
            OutputFormat::Json => print_value(
                &json!({ "key": args.key, "cached": true, "value": describe(&value) }),
                format,
            ),
            OutputFormat::Text => {
                if value.is_null() {
                    println!("{} {}", args.key.cyan(), "(cached null)".dimmed());
                } else {
                    println!("{}", args.key.cyan());
                    print_value(&describe(&value), format);
                }
            }
        },
        None => match format {
            OutputFormat::Json => print_value(&json!({ "key": args.key, "cached": false }), format),
            OutputFormat::Text => print_warning(&format!("{} is not cached", args.key)),
        },
    }
    Ok(())
}

pub async fn remove(adapter: &RedisCacheAdapter, args: &KeyArgs) -> Result<()> {
    require_connection(adapter).await?;

    if adapter.remove(&args.key, args.cache_name.as_deref()).await {
        print_success(&format!("Removed {}", args.key));
    } else {
        print_warning(&format!("{} was not cached", args.key));
    }
    Ok(())
}

pub async fn evict(adapter: &RedisCacheAdapter, args: &EvictArgs) -> Result<()> {
    require_connection(adapter).await?;

    let cache_name = args.cache_name.as_deref();
    if args.all {
        adapter.evict_all(cache_name, &args.tags).await;
    } else {
        adapter.evict_any(cache_name, &args.tags).await;
    }

    let mode = if args.all { "all of" } else { "any of" };
    print_success(&format!("Evicted values tagged with {mode}: {}", args.tags.join(", ")));
    Ok(())
}
