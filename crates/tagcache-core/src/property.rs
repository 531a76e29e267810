//! Cached property pairs: a cached getter whose value is dropped by the setter.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::engine::CacheEngine;
use crate::error::{CacheError, Result};
use crate::key::OperationId;
use crate::policy::{CachePolicy, CacheableOperation};

/// A getter cached without arguments plus the setter that invalidates it.
#[derive(Debug, Clone)]
pub struct CachedProperty {
    getter: CacheableOperation,
}

impl CachedProperty {
    /// Register the getter of a property. The identity must take no parameters.
    pub fn new(getter: OperationId, policy: CachePolicy) -> Result<Self> {
        if getter.param_count() != 0 {
            return Err(CacheError::invalid_operation(format!(
                "property getter {getter} must not take parameters"
            )));
        }
        Ok(Self {
            getter: CacheableOperation::new(getter, policy)?,
        })
    }

    pub fn getter(&self) -> &CacheableOperation {
        &self.getter
    }

    /// Read the property through the cache.
    pub async fn get<T, E, F, Fut>(&self, engine: &CacheEngine, f: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        engine.cached(&self.getter, &[], f).await
    }

    /// Run the setter, then drop the cached getter value.
    ///
    /// The cached value is dropped even when the setter fails, since it may
    /// have changed state before failing.
    pub async fn set<R, F, Fut>(&self, engine: &CacheEngine, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let result = f().await;
        engine.invalidate(&self.getter, &[]).await;
        result
    }
}
