//! Method-result caching with dependency-tag invalidation.
//!
//! ## Architecture
//!
//! - **Keys**: operation identity + rendered arguments ([`KeyBuilder`])
//! - **Contexts**: per-invocation settings the running operation can adjust
//!   ([`CacheContext`], [`CacheScope`])
//! - **Adapters**: pluggable storage behind [`CacheAdapter`]; the in-process
//!   [`LocalCacheAdapter`] ships here, the Redis adapter in `tagcache-redis`
//! - **Engine**: entry/success/exit interception hooks with per-key stampede
//!   protection ([`CacheEngine`])
//!
//! ## Invalidation
//!
//! Every cached result is registered under dependency tags. Evicting by tags
//! removes either the entries carrying all tags (intersection) or any tag
//! (union), without tracking individual keys.
//!
//! ```
//! use std::sync::LazyLock;
//! use tagcache_core::{CacheEngine, CachePolicy, CacheableOperation, EvictPolicy, OperationId, cache_args};
//!
//! static GET_CARS: LazyLock<CacheableOperation> = LazyLock::new(|| {
//!     CacheableOperation::new(
//!         OperationId::new("cars::Garage::get_cars", &[]),
//!         CachePolicy::new().with_tags(["cars"]),
//!     )
//!     .expect("valid operation")
//! });
//!
//! # tokio_test::block_on(async {
//! let engine = CacheEngine::local();
//! let cars: Result<Vec<String>, tagcache_core::CacheError> = engine
//!     .cached(&GET_CARS, &cache_args![], || async { Ok(vec!["carA".to_string()]) })
//!     .await;
//! assert_eq!(cars.unwrap(), ["carA"]);
//!
//! engine.evict(&EvictPolicy::any(["cars"])).await;
//! # });
//! ```

pub mod adapter;
pub mod context;
pub mod engine;
pub mod error;
pub mod key;
pub mod local;
pub mod policy;
pub mod property;
pub mod stampede;
pub mod tags;
pub mod value;

pub use adapter::{CacheAdapter, CacheStats};
pub use context::{CacheContext, CacheScope, ContextStack, SharedContext};
pub use engine::{CacheEngine, Entry, Invocation};
pub use error::{CacheError, Result};
pub use key::{ArgValue, CacheKey, KeyBuilder, OperationId, ToArgValue, build_key};
pub use local::{CachedEntry, ExpiringMap, LocalCacheAdapter};
pub use policy::{CachePolicy, CacheableOperation, EvictPolicy};
pub use property::CachedProperty;
pub use stampede::{StampedeGuard, StampedeLocks};
pub use tags::TagIndex;
pub use value::{CachedValue, NULL_MARKER};
