//! Per-request context passed down the middleware and handler chain.
//!
//! A [`Context`] owns the [`Request`], the routing state ([`RouteContext`]),
//! a [`CancellationToken`] and a typed [`Extensions`] map. It moves by value
//! through every middleware, every mount and finally into the matched
//! handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::Request;

pub mod pool;
pub mod route;

pub use pool::{ContextPool, PooledRouteContext};
pub use route::{RouteContext, RouteParams};

/// Type-erased request extensions map: used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous one of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

static NO_PARAMS: RouteParams = RouteParams::new();

/// Per-request context.
///
/// # Examples
///
/// ```
/// use rmux::context::Context;
/// use rmux::http::{Method, Request};
///
/// let mut ctx = Context::new(Request::new(Method::Get, "/"));
/// ctx.extensions_mut().insert(7u32);
/// assert_eq!(ctx.extensions().get::<u32>(), Some(&7));
/// assert!(ctx.route_context().is_none());
/// assert!(!ctx.cancellation().is_cancelled());
/// ```
pub struct Context {
    request: Request,
    route: Option<PooledRouteContext>,
    cancellation: CancellationToken,
    extensions: Extensions,
}

impl Context {
    /// Creates a context with a fresh, never-cancelled token.
    pub fn new(request: Request) -> Self {
        Self::with_cancellation(request, CancellationToken::new())
    }

    /// Creates a context carrying `token`.
    pub fn with_cancellation(request: Request, token: CancellationToken) -> Self {
        Self {
            request,
            route: None,
            cancellation: token,
            extensions: Extensions::new(),
        }
    }

    /// Attaches a caller-owned routing context.
    ///
    /// A router receiving a context that already has routing state reuses it
    /// instead of taking one from its pool, which lets callers observe route
    /// patterns and params gathered across nested routers.
    #[must_use]
    pub fn with_route_context(mut self, rctx: RouteContext) -> Self {
        self.route = Some(PooledRouteContext::detached(rctx));
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// The request's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn route_context(&self) -> Option<&RouteContext> {
        self.route.as_deref()
    }

    pub fn route_context_mut(&mut self) -> Option<&mut RouteContext> {
        self.route.as_deref_mut()
    }

    /// Returns the innermost value captured for URL param `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.route_context()?.url_param(key)
    }

    /// All URL params captured so far.
    pub fn params(&self) -> &RouteParams {
        self.route_context()
            .map_or(&NO_PARAMS, RouteContext::url_params)
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn has_route_context(&self) -> bool {
        self.route.is_some()
    }

    pub(crate) fn attach_route_context(&mut self, rctx: PooledRouteContext) {
        self.route = Some(rctx);
    }

    /// Splits the context into the request and its routing state, attaching
    /// an unpooled routing context if none is present yet.
    pub(crate) fn routing_parts(&mut self) -> (&Request, &mut RouteContext) {
        let rctx = self
            .route
            .get_or_insert_with(|| PooledRouteContext::detached(RouteContext::new()));
        (&self.request, rctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[derive(Debug, PartialEq)]
    struct UserId(u64);

    #[test]
    fn extensions_roundtrip() {
        let mut ext = Extensions::new();
        assert!(ext.insert(UserId(1)).is_none());
        assert_eq!(ext.insert(UserId(2)), Some(UserId(1)));
        ext.get_mut::<UserId>().unwrap().0 += 1;
        assert_eq!(ext.get::<UserId>(), Some(&UserId(3)));
        assert_eq!(ext.remove::<UserId>(), Some(UserId(3)));
        assert!(ext.get::<UserId>().is_none());
    }

    #[test]
    fn params_without_routing_state() {
        let ctx = Context::new(Request::new(Method::Get, "/"));
        assert!(ctx.params().is_empty());
        assert_eq!(ctx.param("id"), None);
    }

    #[test]
    fn caller_supplied_route_context() {
        let mut rctx = RouteContext::new();
        rctx.add_url_param("id", "9");
        let mut ctx = Context::new(Request::new(Method::Get, "/")).with_route_context(rctx);
        assert!(ctx.has_route_context());
        assert_eq!(ctx.param("id"), Some("9"));

        let (request, rctx) = ctx.routing_parts();
        rctx.set_route_path(request.path());
        assert_eq!(ctx.route_context().and_then(RouteContext::route_path), Some("/"));
    }

    #[test]
    fn cancellation_is_shared_with_caller() {
        let token = CancellationToken::new();
        let ctx = Context::with_cancellation(Request::new(Method::Get, "/"), token.clone());
        token.cancel();
        assert!(ctx.cancellation().is_cancelled());
    }
}
