//! Per-invocation caching context and the per-task context stack.
//!
//! Every cacheable invocation that misses the cache pushes a [`CacheContext`]
//! before the operation runs and pops it on exit. The running operation can
//! reach its own context through [`CacheScope`] and adjust how its result will
//! be cached:
//!
//! ```ignore
//! engine.cached(&GET_CAR, &cache_args![id], || async move {
//!     let car = load_car(id).await?;
//!     CacheScope::with_current(|ctx| ctx.change_dependency_tag("car_", &format!("car_{id}")))?;
//!     Ok(car)
//! }).await
//! ```
//!
//! The stack lives in a tokio task-local. Each invocation runs its operation
//! in a scope of its own holding the enclosing frames plus its own context, so
//! nested calls see strictly nested contexts, sibling calls polled together
//! (`join!`) never see each other's frames, and a spawned task starts with an
//! empty stack.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{CacheError, Result};
use crate::key::CacheKey;

/// Caching parameters of one in-flight invocation.
#[derive(Debug, Clone)]
pub struct CacheContext {
    key: CacheKey,
    life_span: Duration,
    dependency_tags: Vec<String>,
}

impl CacheContext {
    pub fn new(key: CacheKey, life_span: Duration, dependency_tags: Vec<String>) -> Self {
        Self {
            key,
            life_span,
            dependency_tags,
        }
    }

    /// Key the result will be stored under.
    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }

    pub fn life_span(&self) -> Duration {
        self.life_span
    }

    /// Replace the lifetime of the result.
    pub fn set_life_span(&mut self, life_span: Duration) {
        self.life_span = life_span;
    }

    /// Extend the lifetime of the result, saturating at "never expires".
    pub fn extend_life_span(&mut self, by: Duration) {
        self.life_span = self.life_span.saturating_add(by);
    }

    /// Do not store the result of the current invocation.
    pub fn disable_caching(&mut self) {
        self.life_span = Duration::ZERO;
    }

    pub fn is_caching_disabled(&self) -> bool {
        self.life_span.is_zero()
    }

    pub fn dependency_tags(&self) -> &[String] {
        &self.dependency_tags
    }

    pub fn dependency_tags_mut(&mut self) -> &mut Vec<String> {
        &mut self.dependency_tags
    }

    pub fn add_dependency_tag(&mut self, tag: impl Into<String>) {
        self.dependency_tags.push(tag.into());
    }

    /// Replace the first occurrence of `old` with `new`.
    ///
    /// Returns `false` and leaves the tags untouched when `old` is not present.
    pub fn change_dependency_tag(&mut self, old: &str, new: impl Into<String>) -> bool {
        match self.dependency_tags.iter_mut().find(|tag| tag.as_str() == old) {
            Some(tag) => {
                *tag = new.into();
                true
            }
            None => false,
        }
    }
}

/// A context shared between the engine and the running operation.
pub type SharedContext = Arc<Mutex<CacheContext>>;

/// LIFO stack of active contexts.
#[derive(Debug, Default, Clone)]
pub struct ContextStack {
    frames: Vec<SharedContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new context and return a handle to it.
    pub fn push(
        &mut self,
        key: CacheKey,
        life_span: Duration,
        dependency_tags: Vec<String>,
    ) -> SharedContext {
        let ctx = Arc::new(Mutex::new(CacheContext::new(key, life_span, dependency_tags)));
        self.frames.push(Arc::clone(&ctx));
        ctx
    }

    pub(crate) fn push_shared(&mut self, ctx: SharedContext) {
        self.frames.push(ctx);
    }

    /// Remove the innermost context.
    pub fn pop(&mut self) -> Result<SharedContext> {
        self.frames.pop().ok_or(CacheError::NoActiveContext)
    }

    /// Innermost context.
    pub fn current(&self) -> Result<SharedContext> {
        self.frames
            .last()
            .cloned()
            .ok_or(CacheError::NoActiveContext)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

tokio::task_local! {
    static CONTEXT_STACK: ContextStack;
}

/// Access to the context stack of the current task.
pub struct CacheScope;

impl CacheScope {
    /// Run `fut` with `ctx` as the innermost context.
    ///
    /// The frames of the enclosing scope are copied, so the context is popped
    /// when `fut` completes or is dropped and no other future polled on the
    /// same task can observe it.
    pub async fn enter<F: Future>(ctx: SharedContext, fut: F) -> F::Output {
        let mut stack = CONTEXT_STACK
            .try_with(ContextStack::clone)
            .unwrap_or_default();
        stack.push_shared(ctx);
        CONTEXT_STACK.scope(stack, fut).await
    }

    /// Whether the current task runs inside [`CacheScope::enter`].
    pub fn is_active() -> bool {
        CONTEXT_STACK.try_with(|_| ()).is_ok()
    }

    /// Innermost context of the current task.
    pub fn current() -> Result<SharedContext> {
        CONTEXT_STACK
            .try_with(ContextStack::current)
            .unwrap_or(Err(CacheError::NoActiveContext))
    }

    /// Mutate the innermost context of the current task.
    pub fn with_current<R>(f: impl FnOnce(&mut CacheContext) -> R) -> Result<R> {
        let ctx = Self::current()?;
        let mut guard = ctx.lock();
        Ok(f(&mut guard))
    }

    /// Number of active contexts in the current task.
    pub fn depth() -> usize {
        CONTEXT_STACK.try_with(ContextStack::depth).unwrap_or(0)
    }
}
