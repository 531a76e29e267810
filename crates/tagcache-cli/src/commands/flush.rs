use anyhow::{Context, Result, bail};
use tagcache_redis::RedisCacheAdapter;

use crate::cli::FlushArgs;
use crate::output::print_success;

pub async fn flush(adapter: &RedisCacheAdapter, args: &FlushArgs) -> Result<()> {
    if args.notify_only {
        adapter
            .publish_flushed()
            .await
            .context("failed to publish flushed event")?;
        print_success("Published flushed event; every instance dropped its local cache");
        return Ok(());
    }

    if !args.yes {
        bail!("flushing clears both Redis databases; pass --yes to confirm");
    }

    adapter.flush().await.context("failed to flush Redis")?;
    let config = adapter.config();
    print_success(&format!(
        "Flushed databases {} and {} and notified every instance",
        config.cache_db, config.tags_db
    ));
    Ok(())
}
