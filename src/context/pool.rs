//! Reuse of [`RouteContext`] buffers across requests.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use super::RouteContext;

/// Default number of idle contexts a pool keeps around.
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// A concurrent pool of [`RouteContext`]s.
///
/// Each top-level [`RouterService`](crate::router::RouterService) owns one
/// (or shares one injected with [`Mux::with_pool`](crate::router::Mux::with_pool)).
/// Acquired contexts come back automatically when their [`PooledRouteContext`]
/// is dropped, including when a handler panics.
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<RouteContext>>,
    max_idle: usize,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE)
    }

    /// Creates a pool that retains at most `max_idle` released contexts.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Takes a reset context out of the pool, allocating one if it is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledRouteContext {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let mut ctx = recycled.unwrap_or_default();
        ctx.reset();
        PooledRouteContext {
            ctx,
            pool: Some(Arc::clone(self)),
        }
    }

    /// Number of contexts currently waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, mut ctx: RouteContext) {
        ctx.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(ctx);
        }
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`RouteContext`] on loan from a [`ContextPool`], or owned outright when
/// the caller supplied it.
#[derive(Debug)]
pub struct PooledRouteContext {
    ctx: RouteContext,
    pool: Option<Arc<ContextPool>>,
}

impl PooledRouteContext {
    /// Wraps a caller-owned context; nothing is returned anywhere on drop.
    pub fn detached(ctx: RouteContext) -> Self {
        Self { ctx, pool: None }
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl Deref for PooledRouteContext {
    type Target = RouteContext;

    fn deref(&self) -> &RouteContext {
        &self.ctx
    }
}

impl DerefMut for PooledRouteContext {
    fn deref_mut(&mut self) -> &mut RouteContext {
        &mut self.ctx
    }
}

impl Drop for PooledRouteContext {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.ctx));
        }
    }
}
