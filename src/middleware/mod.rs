//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the rest of the chain. A router composes its
//! middleware list once, in registration order, around its routing handler
//! with [`chain`]; inline routers compose theirs around each endpoint.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware (and by closures
//!   `Fn(Context, Next) -> impl Future<Output = Response>`).
//! - [`Next`]: the wrapped remainder of the chain; call [`Next::run`] to
//!   forward the request.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware.
//! - [`chain`]: folds a middleware list and a terminal handler into one
//!   handler.
//!
//! ## Built-in middleware
//!
//! - [`Logger`]: one structured log line per request.
//! - [`Timeout`]: answers `504` and cancels the request token after a deadline.
//! - [`Throttle`]: caps in-flight requests with a bounded backlog.
//! - [`RealIp`]: trusts `X-Real-IP` / `X-Forwarded-For` for the remote address.

use std::sync::Arc;

use crate::context::Context;
use crate::router::{BoxFuture, Handler, IntoHandler};
use crate::Response;

pub mod logger;
pub mod real_ip;
pub mod throttle;
pub mod timeout;

pub use logger::Logger;
pub use real_ip::RealIp;
pub use throttle::Throttle;
pub use timeout::Timeout;

/// The rest of the chain, as seen from one middleware.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware forwards a
/// request at most once. Not calling it short-circuits the chain.
///
/// # Examples
///
/// ```rust,no_run
/// use rmux::{Response, context::Context, middleware::{Middleware, Next}};
/// use rmux::router::BoxFuture;
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Next {
    handler: Handler,
}

impl Next {
    /// Wraps `handler` as the continuation of a middleware.
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }

    /// Forwards the request to the rest of the chain.
    pub async fn run(self, ctx: Context) -> Response {
        self.handler.call(ctx).await
    }
}

/// A type-erased, reference-counted middleware.
pub type MiddlewareHandler = Arc<dyn Middleware>;

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`]. They may:
///
/// - **Pass through**: call `next.run(ctx).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// Implementations must be `Send + Sync`: one instance serves every request.
///
/// The [`Context`] is gone once handed to `next`, so routing results that are
/// only known after the route lookup, such as the matched pattern, are read
/// from the returned [`Response`] instead (see [`Response::route_pattern`]).
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;

    /// A name for route documentation; the implementing type's name by
    /// default.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(self(ctx, next))
    }
}

/// Converts a [`Middleware`] into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use rmux::middleware::{Logger, from_middleware};
///
/// let handler = from_middleware(Logger);
/// ```
pub fn from_middleware<M>(middleware: M) -> MiddlewareHandler
where
    M: Middleware,
{
    Arc::new(middleware)
}

struct Layer {
    middleware: MiddlewareHandler,
    next: Handler,
}

impl IntoHandler for Layer {
    fn call(&self, ctx: Context) -> BoxFuture {
        self.middleware.handle(ctx, Next::new(Arc::clone(&self.next)))
    }

    fn name(&self) -> &'static str {
        self.next.name()
    }
}

/// Wraps `endpoint` in `middlewares`.
///
/// The first middleware in the slice runs first; the last one runs right
/// before `endpoint`. An empty slice hands `endpoint` back untouched.
pub fn chain(middlewares: &[MiddlewareHandler], endpoint: Handler) -> Handler {
    middlewares.iter().rev().fold(endpoint, |next, middleware| {
        Arc::new(Layer {
            middleware: Arc::clone(middleware),
            next,
        })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::http::{Method, Request, StatusCode};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn recorder(trace: &Trace, name: &'static str) -> MiddlewareHandler {
        let trace = Arc::clone(trace);
        from_middleware(move |ctx: Context, next: Next| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push(format!("{name}:before"));
                let response = next.run(ctx).await;
                trace.lock().unwrap().push(format!("{name}:after"));
                response
            }
        })
    }

    fn endpoint(trace: &Trace) -> Handler {
        let trace = Arc::clone(trace);
        Arc::new(move |_: Context| {
            let trace = Arc::clone(&trace);
            async move {
                trace.lock().unwrap().push("endpoint".to_owned());
                Response::new(StatusCode::Ok)
            }
        })
    }

    fn ctx() -> Context {
        Context::new(Request::new(Method::Get, "/"))
    }

    #[test]
    fn empty_chain_returns_endpoint() {
        let trace = Trace::default();
        let h = endpoint(&trace);
        let chained = chain(&[], Arc::clone(&h));
        assert!(Arc::ptr_eq(&h, &chained));
    }

    #[test]
    fn chained_handler_keeps_endpoint_name() {
        async fn show_user(_: Context) -> Response {
            Response::new(StatusCode::Ok)
        }

        let trace = Trace::default();
        let h = chain(&[recorder(&trace, "a")], Arc::new(show_user));
        assert!(h.name().ends_with("show_user"), "{}", h.name());
        assert_eq!(from_middleware(Logger).name(), "rmux::middleware::logger::Logger");
    }

    #[tokio::test]
    async fn runs_in_registration_order() {
        let trace = Trace::default();
        let h = chain(
            &[recorder(&trace, "a"), recorder(&trace, "b")],
            endpoint(&trace),
        );

        let response = h.call(ctx()).await;

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["a:before", "b:before", "endpoint", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let trace = Trace::default();
        let deny = from_middleware(|_: Context, _: Next| async {
            Response::new(StatusCode::Forbidden)
        });
        let h = chain(&[recorder(&trace, "a"), deny], endpoint(&trace));

        let response = h.call(ctx()).await;

        assert_eq!(response.status(), StatusCode::Forbidden);
        assert_eq!(*trace.lock().unwrap(), vec!["a:before", "a:after"]);
    }
}
