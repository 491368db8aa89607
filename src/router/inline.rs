use std::sync::Arc;

use super::error::{fatal, RouterError};
use super::mux::{MountTarget, Mux};
use super::tree::MethodSlot;
use super::{Handler, IntoHandler, Router};
use crate::http::Method;
use crate::middleware::{chain, from_middleware, Middleware, MiddlewareHandler};

/// A view of a [`Mux`] with extra middleware.
///
/// Created by [`Router::with`] and [`Router::group`]. Routes registered
/// through it land in the owning mux's tree, each wrapped with the inline
/// middleware at registration time. Its middleware list is its own: adding to
/// it never affects the owning mux or sibling inline routers.
///
/// ```
/// use rmux::router::{Mux, Router};
/// use rmux::middleware::Next;
/// use rmux::{Response, StatusCode, context::Context};
///
/// let mut mux = Mux::new();
/// mux.group(|admin| {
///     admin.use_middleware(|ctx: Context, next: Next| async move {
///         match ctx.request().headers().get("authorization") {
///             Some(_) => next.run(ctx).await,
///             None => Response::new(StatusCode::Unauthorized),
///         }
///     });
///     admin.get("/admin", |_: Context| async { Response::new(StatusCode::Ok) });
/// });
/// mux.get("/public", |_: Context| async { Response::new(StatusCode::Ok) });
/// ```
pub struct InlineMux<'a> {
    mux: &'a mut Mux,
    middlewares: Vec<MiddlewareHandler>,
    finalized: bool,
}

impl<'a> InlineMux<'a> {
    pub(crate) fn new(mux: &'a mut Mux, middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            mux,
            middlewares,
            finalized: false,
        }
    }

    fn fork(&mut self, extra: Option<MiddlewareHandler>) -> InlineMux<'_> {
        let mut middlewares = self.middlewares.clone();
        middlewares.extend(extra);
        InlineMux::new(&mut *self.mux, middlewares)
    }

    fn wrap(&self, handler: impl IntoHandler) -> Handler {
        chain(&self.middlewares, Arc::new(handler))
    }
}

impl Router for InlineMux<'_> {
    fn use_middleware(&mut self, middleware: impl Middleware) {
        if self.finalized {
            fatal(RouterError::MiddlewareAfterRoutes);
        }
        self.middlewares.push(from_middleware(middleware));
    }

    fn with(&mut self, middleware: impl Middleware) -> InlineMux<'_> {
        self.fork(Some(from_middleware(middleware)))
    }

    fn group(&mut self, f: impl FnOnce(&mut InlineMux<'_>)) {
        f(&mut self.fork(None));
    }

    fn route(&mut self, pattern: &str, f: impl FnOnce(&mut Mux)) {
        let mut router = Mux::with_pool(self.mux.sub_pool());
        f(&mut router);
        self.mount(pattern, router);
    }

    fn mount(&mut self, pattern: &str, router: Mux) {
        self.finalized = true;
        self.mux
            .mount_target(pattern, MountTarget::Router(router), &self.middlewares);
    }

    fn mount_handler(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.finalized = true;
        self.mux.mount_target(
            pattern,
            MountTarget::Handler(Arc::new(handler)),
            &self.middlewares,
        );
    }

    fn handle(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.finalized = true;
        self.mux.insert_endpoint(
            MethodSlot::All,
            pattern,
            Arc::new(handler),
            &self.middlewares,
            false,
        );
    }

    fn on(&mut self, method: Method, pattern: &str, handler: impl IntoHandler) {
        self.finalized = true;
        self.mux
            .insert_method(method, pattern, Arc::new(handler), &self.middlewares);
    }

    fn not_found(&mut self, handler: impl IntoHandler) {
        let handler = self.wrap(handler);
        self.mux.set_not_found(handler);
    }

    fn method_not_allowed(&mut self, handler: impl IntoHandler) {
        let handler = self.wrap(handler);
        self.mux.set_method_not_allowed(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::http::{Request, Response, StatusCode};
    use crate::middleware::Next;

    fn tag(name: &'static str) -> impl Middleware {
        move |ctx: Context, next: Next| async move {
            let mut response = next.run(ctx).await;
            response.add_header("X-Tag", name);
            response
        }
    }

    fn ok(_: Context) -> impl Future<Output = Response> + Send {
        async { Response::new(StatusCode::Ok) }
    }

    #[tokio::test]
    async fn inline_middleware_stays_inline() {
        let mut mux = Mux::new();
        mux.with(tag("a")).get("/a", ok);
        mux.get("/plain", ok);
        let service = mux.into_service();

        let response = service.serve(Request::new(Method::Get, "/a")).await;
        assert_eq!(response.headers().get_all("x-tag").collect::<Vec<_>>(), ["a"]);

        let response = service.serve(Request::new(Method::Get, "/plain")).await;
        assert!(response.headers().get("x-tag").is_none());
    }

    #[tokio::test]
    async fn nested_with_appends() {
        let mut mux = Mux::new();
        mux.with(tag("outer")).with(tag("inner")).get("/", ok);
        let service = mux.into_service();

        let response = service.serve(Request::new(Method::Get, "/")).await;
        // the inner tag wraps the handler, so its header is added first
        assert_eq!(
            response.headers().get_all("x-tag").collect::<Vec<_>>(),
            ["inner", "outer"]
        );
    }

    #[test]
    #[should_panic(expected = "all middlewares must be defined before routes")]
    fn use_after_route_panics() {
        let mut mux = Mux::new();
        mux.group(|g| {
            g.get("/", ok);
            g.use_middleware(tag("late"));
        });
    }

    #[test]
    #[should_panic(expected = "all middlewares must be defined before routes")]
    fn with_finalizes_the_mux() {
        let mut mux = Mux::new();
        mux.with(tag("a")).get("/", ok);
        mux.use_middleware(tag("late"));
    }
}
