use std::sync::{Arc, OnceLock};

use super::error::{fatal, RouterError};
use super::inline::InlineMux;
use super::service::{self, MountDelegate, RouterService};
use super::tree::{Endpoint, MethodSlot, Node};
use super::walk::{self, Route, Routes};
use super::{methods, Handler, IntoHandler, Pattern, Router};
use crate::context::{ContextPool, RouteContext};
use crate::http::Method;
use crate::middleware::{chain, from_middleware, Middleware, MiddlewareHandler};

/// A router under construction.
///
/// A `Mux` owns its route tree, its middleware stack, its fallback handlers
/// and every router mounted into it. Register routes through the [`Router`]
/// trait, then call [`into_service`](Self::into_service) to get the
/// [`RouterService`] that serves requests.
///
/// Middleware added with [`use_middleware`](Router::use_middleware) wraps the
/// whole router, so it runs before the route is looked up and even for
/// requests that end up in the not-found handler. It must all be added before
/// the first route.
pub struct Mux {
    tree: Node<Handler, usize>,
    middlewares: Vec<MiddlewareHandler>,
    finalized: bool,
    not_found: Option<Handler>,
    method_not_allowed: Option<Handler>,
    mounts: Vec<Mounted>,
    pool: Arc<ContextPool>,
}

/// A router mounted into a parent, and the slot its frozen form is published
/// to once the parent is frozen.
struct Mounted {
    router: Mux,
    service: Arc<OnceLock<RouterService>>,
}

/// What a mount point delegates to.
pub(crate) enum MountTarget {
    Router(Mux),
    Handler(Handler),
}

impl Default for Mux {
    fn default() -> Self {
        Self::new()
    }
}

impl Mux {
    pub fn new() -> Self {
        Self::with_pool(Arc::new(ContextPool::new()))
    }

    /// Creates a router taking routing contexts from `pool`.
    ///
    /// Only the outermost router of a request acquires a context; mounted
    /// routers reuse the one they are handed.
    pub fn with_pool(pool: Arc<ContextPool>) -> Self {
        Self {
            tree: Node::new(),
            middlewares: Vec::new(),
            finalized: false,
            not_found: None,
            method_not_allowed: None,
            mounts: Vec::new(),
            pool,
        }
    }

    /// Freezes the router, and every router mounted into it, for serving.
    ///
    /// The middleware stack is composed around the routing handler once,
    /// here. A router that never had a route registered answers every request
    /// with its not-found handler.
    pub fn into_service(self) -> RouterService {
        let Mux {
            tree,
            middlewares,
            finalized,
            not_found,
            method_not_allowed,
            mounts,
            pool,
        } = self;

        let services: Vec<RouterService> = mounts
            .into_iter()
            .map(|mounted| {
                let frozen = mounted.router.into_service();
                let published = mounted.service.set(frozen.clone()).is_ok();
                debug_assert!(published, "mounted router frozen twice");
                frozen
            })
            .collect();

        let tree = tree.map(&mut |handler| handler, &mut |idx: usize| {
            services[idx].clone()
        });

        RouterService::new(
            tree,
            not_found.unwrap_or_else(service::default_not_found),
            method_not_allowed.unwrap_or_else(service::default_method_not_allowed),
            middlewares,
            finalized,
            pool,
        )
    }

    // ── Registration plumbing shared with InlineMux ──────────────────────────

    /// Stores `handler`, wrapped with `inline`, on the node for `pattern`.
    pub(crate) fn insert_endpoint(
        &mut self,
        slot: MethodSlot,
        pattern: &str,
        handler: Handler,
        inline: &[MiddlewareHandler],
        stub: bool,
    ) -> &mut Node<Handler, usize> {
        let pattern = Pattern::parse(pattern).unwrap_or_else(|err| fatal(err));
        self.finalized = true;

        match &slot {
            MethodSlot::All => tracing::debug!(pattern = pattern.as_str(), stub, "route registered"),
            MethodSlot::Exact(method) => {
                tracing::debug!(method = %method, pattern = pattern.as_str(), "route registered");
            }
        }

        let mut endpoint = Endpoint::new(chain(inline, handler), &pattern);
        endpoint.middlewares = inline.to_vec();
        endpoint.stub = stub;

        let node = self.tree.insert(pattern.segments());
        node.set_endpoint(slot, endpoint);
        node
    }

    pub(crate) fn insert_method(
        &mut self,
        method: Method,
        pattern: &str,
        handler: Handler,
        inline: &[MiddlewareHandler],
    ) {
        if !methods::is_registered(&method) {
            fatal(RouterError::UnknownMethod {
                method: method.to_string(),
            });
        }
        self.insert_endpoint(MethodSlot::Exact(method), pattern, handler, inline, false);
    }

    /// Registers the delegation endpoints of a mount at `pattern`.
    pub(crate) fn mount_target(
        &mut self,
        pattern: &str,
        target: MountTarget,
        inline: &[MiddlewareHandler],
    ) {
        if self.has_mount_at(pattern, "*") || self.has_mount_at(pattern, "/*") {
            fatal(RouterError::DuplicateMount {
                pattern: pattern.to_owned(),
            });
        }

        let (delegate, subroutes) = match target {
            MountTarget::Handler(handler) => (MountDelegate::handler(handler), None),
            MountTarget::Router(mut router) => {
                if router.not_found.is_none() {
                    if let Some(handler) = &self.not_found {
                        router.set_not_found(Arc::clone(handler));
                    }
                }
                if router.method_not_allowed.is_none() {
                    if let Some(handler) = &self.method_not_allowed {
                        router.set_method_not_allowed(Arc::clone(handler));
                    }
                }
                let service = Arc::new(OnceLock::new());
                let delegate = MountDelegate::router(Arc::clone(&service));
                self.mounts.push(Mounted { router, service });
                (delegate, Some(self.mounts.len() - 1))
            }
        };
        tracing::debug!(pattern, router = subroutes.is_some(), "mounted");

        let delegate: Handler = Arc::new(delegate);
        let mut prefix = pattern.to_owned();
        if !prefix.ends_with('/') {
            self.insert_endpoint(MethodSlot::All, &prefix, Arc::clone(&delegate), inline, true);
            prefix.push('/');
            self.insert_endpoint(MethodSlot::All, &prefix, Arc::clone(&delegate), inline, true);
        }
        prefix.push('*');

        let node = self.insert_endpoint(MethodSlot::All, &prefix, delegate, inline, false);
        if let Some(idx) = subroutes {
            node.set_subroutes(idx);
        }
    }

    fn has_mount_at(&self, pattern: &str, suffix: &str) -> bool {
        Pattern::parse(&format!("{pattern}{suffix}"))
            .is_ok_and(|wildcard| self.tree.find_pattern(wildcard.segments()))
    }

    /// Sets the not-found handler here and in every mounted router that has
    /// none of its own.
    pub(crate) fn set_not_found(&mut self, handler: Handler) {
        for mounted in &mut self.mounts {
            if mounted.router.not_found.is_none() {
                mounted.router.set_not_found(Arc::clone(&handler));
            }
        }
        self.not_found = Some(handler);
    }

    pub(crate) fn set_method_not_allowed(&mut self, handler: Handler) {
        for mounted in &mut self.mounts {
            if mounted.router.method_not_allowed.is_none() {
                mounted.router.set_method_not_allowed(Arc::clone(&handler));
            }
        }
        self.method_not_allowed = Some(handler);
    }

    pub(crate) fn sub_pool(&self) -> Arc<ContextPool> {
        Arc::clone(&self.pool)
    }

    fn mounted(&self, idx: &usize) -> &dyn Routes {
        &self.mounts[*idx].router
    }
}

impl Router for Mux {
    fn use_middleware(&mut self, middleware: impl Middleware) {
        if self.finalized {
            fatal(RouterError::MiddlewareAfterRoutes);
        }
        self.middlewares.push(from_middleware(middleware));
    }

    fn with(&mut self, middleware: impl Middleware) -> InlineMux<'_> {
        self.finalized = true;
        InlineMux::new(self, vec![from_middleware(middleware)])
    }

    fn group(&mut self, f: impl FnOnce(&mut InlineMux<'_>)) {
        self.finalized = true;
        f(&mut InlineMux::new(self, Vec::new()));
    }

    fn route(&mut self, pattern: &str, f: impl FnOnce(&mut Mux)) {
        let mut router = Mux::with_pool(self.sub_pool());
        f(&mut router);
        self.mount(pattern, router);
    }

    fn mount(&mut self, pattern: &str, router: Mux) {
        self.mount_target(pattern, MountTarget::Router(router), &[]);
    }

    fn mount_handler(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.mount_target(pattern, MountTarget::Handler(Arc::new(handler)), &[]);
    }

    fn handle(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.insert_endpoint(MethodSlot::All, pattern, Arc::new(handler), &[], false);
    }

    fn on(&mut self, method: Method, pattern: &str, handler: impl IntoHandler) {
        self.insert_method(method, pattern, Arc::new(handler), &[]);
    }

    fn not_found(&mut self, handler: impl IntoHandler) {
        self.set_not_found(Arc::new(handler));
    }

    fn method_not_allowed(&mut self, handler: impl IntoHandler) {
        self.set_method_not_allowed(Arc::new(handler));
    }
}

impl Routes for Mux {
    fn routes(&self) -> Vec<Route<'_>> {
        walk::tree_routes(&self.tree, |idx| self.mounted(idx))
    }

    fn middlewares(&self) -> &[MiddlewareHandler] {
        &self.middlewares
    }

    fn match_route(&self, rctx: &mut RouteContext, method: &Method, path: &str) -> bool {
        walk::match_tree(&self.tree, |idx| self.mounted(idx), rctx, method, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::{Request, Response, StatusCode};

    fn ok(body: &'static str) -> impl IntoHandler {
        move |_: Context| async move { Response::new(StatusCode::Ok).body(body) }
    }

    #[tokio::test]
    async fn freezing_publishes_mounted_services() {
        let mut inner = Mux::new();
        inner.get("/", ok("inner"));
        let mut middle = Mux::new();
        middle.mount("/inner", inner);
        let mut root = Mux::new();
        root.mount("/middle", middle);

        let slot = Arc::clone(&root.mounts[0].service);
        let nested = Arc::clone(&root.mounts[0].router.mounts[0].service);
        assert!(slot.get().is_none());
        assert!(nested.get().is_none());

        let service = root.into_service();
        assert!(slot.get().is_some());
        assert!(nested.get().is_some());

        let response = service.serve(Request::new(Method::Get, "/middle/inner")).await;
        assert_eq!(response.text(), "inner");
    }

    #[test]
    fn fallbacks_pushed_into_mounts() {
        let mut sub = Mux::new();
        sub.get("/", ok("sub"));

        let mut root = Mux::new();
        root.mount("/sub", sub);
        root.not_found(ok("root 404"));

        assert!(root.mounts[0].router.not_found.is_some());
        assert!(root.mounts[0].router.method_not_allowed.is_none());
    }

    #[test]
    fn own_fallback_is_kept() {
        let mut sub = Mux::new();
        sub.not_found(ok("sub 404"));
        let own = sub.not_found.clone().unwrap();

        let mut root = Mux::new();
        root.not_found(ok("root 404"));
        root.mount("/sub", sub);

        let kept = root.mounts[0].router.not_found.as_ref().unwrap();
        assert!(Arc::ptr_eq(kept, &own));
    }

    #[test]
    fn mount_lists_only_the_wildcard_route() {
        let mut sub = Mux::new();
        sub.get("/x", ok("x"));

        let mut root = Mux::new();
        root.mount("/sub", sub);

        let routes = root.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].pattern, "/sub/*");
        assert!(routes[0].subroutes.is_some());
    }

    #[tokio::test]
    async fn unfinalized_mux_answers_not_found() {
        let mut mux = Mux::new();
        mux.use_middleware(|ctx: Context, next: crate::middleware::Next| next.run(ctx));
        let service = mux.into_service();

        let response = service.serve(Request::new(Method::Get, "/")).await;
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.text(), "404 page not found");
    }

    #[tokio::test]
    async fn pool_is_shared_with_route_subrouters() {
        let pool = Arc::new(ContextPool::new());
        let mut mux = Mux::with_pool(Arc::clone(&pool));
        mux.route("/api", |api| {
            assert!(Arc::ptr_eq(&api.pool, &pool));
            api.get("/ping", ok("pong"));
        });
        let service = mux.into_service();

        let response = service.serve(Request::new(Method::Get, "/api/ping")).await;
        assert_eq!(response.text(), "pong");
        assert_eq!(pool.idle(), 1);
    }
}
