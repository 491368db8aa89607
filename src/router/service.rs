use std::sync::{Arc, OnceLock};

use super::tree::Node;
use super::walk::{self, Route, Routes};
use super::{methods, BoxFuture, Handler, IntoHandler};
use crate::context::{Context, ContextPool, RouteContext};
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::{chain, MiddlewareHandler};

/// A frozen router, ready to serve requests.
///
/// Built by [`Mux::into_service`](super::Mux::into_service). Cloning is
/// cheap and every clone serves from the same immutable route tree, so a
/// service can be shared across tasks without locking. It implements
/// [`IntoHandler`], so it can also be mounted into another router or called
/// directly.
#[derive(Clone)]
pub struct RouterService {
    inner: Arc<Inner>,
}

struct Inner {
    dispatch: Arc<Dispatch>,
    /// Middleware composed around `dispatch`; `None` when no route was ever
    /// registered.
    handler: Option<Handler>,
    middlewares: Vec<MiddlewareHandler>,
    pool: Arc<ContextPool>,
}

impl RouterService {
    pub(crate) fn new(
        tree: Node<Handler, RouterService>,
        not_found: Handler,
        method_not_allowed: Handler,
        middlewares: Vec<MiddlewareHandler>,
        finalized: bool,
        pool: Arc<ContextPool>,
    ) -> Self {
        let dispatch = Arc::new(Dispatch {
            tree,
            not_found,
            method_not_allowed,
        });
        let handler = finalized.then(|| {
            let routing: Handler = Arc::clone(&dispatch) as Handler;
            chain(&middlewares, routing)
        });

        Self {
            inner: Arc::new(Inner {
                dispatch,
                handler,
                middlewares,
                pool,
            }),
        }
    }

    /// Routes `request` with a fresh [`Context`] and returns the response.
    pub async fn serve(&self, request: Request) -> Response {
        IntoHandler::call(self, Context::new(request)).await
    }

    /// The handler answering requests that match no route.
    pub fn not_found_handler(&self) -> &Handler {
        &self.inner.dispatch.not_found
    }

    /// The handler answering requests whose path only matched for other
    /// methods.
    pub fn method_not_allowed_handler(&self) -> &Handler {
        &self.inner.dispatch.method_not_allowed
    }
}

impl IntoHandler for RouterService {
    fn call(&self, mut ctx: Context) -> BoxFuture {
        if !ctx.has_route_context() {
            ctx.attach_route_context(self.inner.pool.acquire());
        }
        match &self.inner.handler {
            Some(handler) => handler.call(ctx),
            None => self.inner.dispatch.not_found.call(ctx),
        }
    }
}

impl Routes for RouterService {
    fn routes(&self) -> Vec<Route<'_>> {
        walk::tree_routes(&self.inner.dispatch.tree, |sub| sub as &dyn Routes)
    }

    fn middlewares(&self) -> &[MiddlewareHandler] {
        &self.inner.middlewares
    }

    fn match_route(&self, rctx: &mut RouteContext, method: &Method, path: &str) -> bool {
        walk::match_tree(
            &self.inner.dispatch.tree,
            |sub| sub as &dyn Routes,
            rctx,
            method,
            path,
        )
    }
}

/// The innermost handler of a router: looks the route up and hands the
/// request to the matched endpoint or a fallback.
struct Dispatch {
    tree: Node<Handler, RouterService>,
    not_found: Handler,
    method_not_allowed: Handler,
}

impl Dispatch {
    fn resolve(&self, ctx: &mut Context) -> Handler {
        let (request, rctx) = ctx.routing_parts();

        let method = rctx.route_method_or_insert(request.method());
        if !methods::is_registered(&method) {
            tracing::trace!(method = %method, "unregistered method");
            return Arc::clone(&self.method_not_allowed);
        }

        let saved = rctx.take_route_path();
        let path = match saved.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ if request.path().is_empty() => "/",
            _ => request.path(),
        };

        let found = self
            .tree
            .find(rctx, &method, path)
            .map(|(_, endpoint)| Arc::clone(&endpoint.handler));
        let handler = match found {
            Some(handler) => handler,
            None if rctx.method_not_allowed() => {
                tracing::trace!(method = %method, path, "method not allowed");
                Arc::clone(&self.method_not_allowed)
            }
            None => {
                tracing::trace!(method = %method, path, "no route");
                Arc::clone(&self.not_found)
            }
        };

        rctx.restore_route_path(saved);
        handler
    }
}

impl IntoHandler for Dispatch {
    fn call(&self, mut ctx: Context) -> BoxFuture {
        let handler = self.resolve(&mut ctx);
        let pattern = ctx
            .route_context()
            .map(RouteContext::route_pattern)
            .filter(|pattern| !pattern.is_empty());
        let response = handler.call(ctx);

        Box::pin(async move {
            let mut response = response.await;
            // a mounted router finishes first and knows the longer pattern
            if response.route_pattern().is_none() {
                if let Some(pattern) = pattern {
                    response.set_route_pattern(pattern);
                }
            }
            response
        })
    }
}

/// The handler registered at a mount point.
///
/// It rewrites the route path to what the mount's wildcard captured, blanks
/// that capture, and passes the same context on.
pub(crate) struct MountDelegate {
    target: DelegateTarget,
}

enum DelegateTarget {
    Handler(Handler),
    /// Filled when the parent router is frozen.
    Router(Arc<OnceLock<RouterService>>),
}

impl MountDelegate {
    pub(crate) fn handler(handler: Handler) -> Self {
        Self {
            target: DelegateTarget::Handler(handler),
        }
    }

    pub(crate) fn router(service: Arc<OnceLock<RouterService>>) -> Self {
        Self {
            target: DelegateTarget::Router(service),
        }
    }
}

impl IntoHandler for MountDelegate {
    fn call(&self, mut ctx: Context) -> BoxFuture {
        let (_, rctx) = ctx.routing_parts();
        let next = rctx.next_route_path();
        rctx.set_route_path(next);
        rctx.clear_wildcard_param();

        match &self.target {
            DelegateTarget::Handler(handler) => handler.call(ctx),
            DelegateTarget::Router(cell) => match cell.get() {
                Some(service) => service.call(ctx),
                None => Box::pin(not_found(ctx)),
            },
        }
    }
}

async fn not_found(_: Context) -> Response {
    Response::new(StatusCode::NotFound)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body("404 page not found")
}

async fn method_not_allowed(_: Context) -> Response {
    Response::new(StatusCode::MethodNotAllowed)
}

pub(crate) fn default_not_found() -> Handler {
    Arc::new(not_found)
}

pub(crate) fn default_method_not_allowed() -> Handler {
    Arc::new(method_not_allowed)
}
