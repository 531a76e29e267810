//! Per-operation caching and eviction policies.
//!
//! Operations are registered once, typically in a `LazyLock` static, and
//! reused for every invocation:
//!
//! ```
//! use std::sync::LazyLock;
//! use tagcache_core::{CachePolicy, CacheableOperation, OperationId};
//!
//! static GET_CAR: LazyLock<CacheableOperation> = LazyLock::new(|| {
//!     CacheableOperation::new(
//!         OperationId::new("cars::Garage::get_car", &["usize"]),
//!         CachePolicy::minutes(5).with_tags(["cars", "car_"]),
//!     )
//!     .expect("valid operation")
//! });
//!
//! assert_eq!(GET_CAR.policy().dependency_tags, ["cars", "car_"]);
//! ```

use std::time::Duration;

use crate::error::Result;
use crate::key::{ArgValue, CacheKey, KeyBuilder, OperationId};

/// How the results of one operation are cached.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Lifetime of a cached result. `Duration::MAX` never expires.
    pub life_span: Duration,
    /// Tags every result is registered under, before runtime adjustments.
    pub dependency_tags: Vec<String>,
    /// Cache name; `None` is the default cache.
    pub cache_name: Option<String>,
    /// Argument positions left out of the key.
    pub ignored_args: Vec<usize>,
    /// Serialize concurrent misses of the same key.
    pub stampede_protection: bool,
    /// `false` runs the operation directly, bypassing the cache.
    pub cacheable: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            life_span: Duration::MAX,
            dependency_tags: Vec::new(),
            cache_name: None,
            ignored_args: Vec::new(),
            stampede_protection: true,
            cacheable: true,
        }
    }
}

impl CachePolicy {
    /// Cache results forever.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude the operation from caching.
    pub fn not_cacheable() -> Self {
        Self {
            cacheable: false,
            ..Self::default()
        }
    }

    pub fn with_life_span(life_span: Duration) -> Self {
        Self {
            life_span,
            ..Self::default()
        }
    }

    pub fn seconds(seconds: u64) -> Self {
        Self::with_life_span(Duration::from_secs(seconds))
    }

    pub fn minutes(minutes: u64) -> Self {
        Self::with_life_span(Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn hours(hours: u64) -> Self {
        Self::with_life_span(Duration::from_secs(hours.saturating_mul(3600)))
    }

    pub fn days(days: u64) -> Self {
        Self::with_life_span(Duration::from_secs(days.saturating_mul(86_400)))
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = Some(cache_name.into());
        self
    }

    /// Leave the argument at `index` out of the key.
    pub fn ignore_arg(mut self, index: usize) -> Self {
        self.ignored_args.push(index);
        self
    }

    pub fn without_stampede_protection(mut self) -> Self {
        self.stampede_protection = false;
        self
    }
}

/// A registered cacheable operation: identity, key builder and policy.
#[derive(Debug, Clone)]
pub struct CacheableOperation {
    key_builder: KeyBuilder,
    policy: CachePolicy,
}

impl CacheableOperation {
    /// Register an operation.
    ///
    /// Fails when the policy ignores an argument the operation does not have.
    pub fn new(identity: OperationId, policy: CachePolicy) -> Result<Self> {
        let key_builder = KeyBuilder::new(identity, &policy.ignored_args)?;
        Ok(Self {
            key_builder,
            policy,
        })
    }

    pub fn identity(&self) -> &OperationId {
        self.key_builder.identity()
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn cache_name(&self) -> Option<&str> {
        self.policy.cache_name.as_deref()
    }

    pub fn build_key(&self, args: &[ArgValue]) -> CacheKey {
        self.key_builder.build_key(args)
    }
}

/// Tags evicted after an operation finishes, successfully or not.
#[derive(Debug, Clone, Default)]
pub struct EvictPolicy {
    pub dependency_tags: Vec<String>,
    /// Evict entries carrying all tags instead of any tag.
    pub use_all_tags: bool,
    pub cache_name: Option<String>,
}

impl EvictPolicy {
    /// Evict entries carrying any of `tags`.
    pub fn any<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependency_tags: tags.into_iter().map(Into::into).collect(),
            use_all_tags: false,
            cache_name: None,
        }
    }

    /// Evict entries carrying all of `tags`.
    pub fn all<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            use_all_tags: true,
            ..Self::any(tags)
        }
    }

    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = Some(cache_name.into());
        self
    }
}
