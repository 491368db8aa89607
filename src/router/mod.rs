//! Request routing: a prefix-tree multiplexer with composable sub-routers.
//!
//! Routes are registered on a [`Mux`] through the [`Router`] trait, then the
//! mux is frozen with [`Mux::into_service`] into a [`RouterService`] that
//! serves requests. Pattern syntax:
//!
//! | Pattern              | Example match           | Captured params           |
//! |----------------------|-------------------------|---------------------------|
//! | `/users`             | `/users`                | *(none)*                  |
//! | `/users/{id}`        | `/users/42`             | `id → "42"`               |
//! | `/users/{id:\d+}`    | `/users/42`             | `id → "42"`               |
//! | `/files/{name}.{ext}`| `/files/a.txt`          | `name → "a"`, `ext → "txt"` |
//! | `/files/*`           | `/files/docs/readme.md` | `* → "docs/readme.md"`    |
//!
//! Static segments win over regex params, regex params over plain params, and
//! plain params over wildcards, whatever the registration order.
//!
//! ```
//! use rmux::router::{Mux, Router};
//! use rmux::{Method, Request, Response, StatusCode, context::Context};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut api = Mux::new();
//! api.get("/users/{id}", |ctx: Context| async move {
//!     let id = ctx.param("id").unwrap_or_default().to_owned();
//!     Response::new(StatusCode::Ok).body(id)
//! });
//!
//! let mut root = Mux::new();
//! root.mount("/api", api);
//! let service = root.into_service();
//!
//! let response = service.serve(Request::new(Method::Get, "/api/users/7")).await;
//! assert_eq!(response.text(), "7");
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::http::Method;
use crate::middleware::Middleware;
use crate::Response;

pub mod error;
pub mod methods;
pub mod pattern;

mod inline;
mod mux;
mod service;
mod tree;
mod walk;

pub use error::RouterError;
pub use inline::InlineMux;
pub use methods::{is_registered, register_method};
pub use mux::Mux;
pub use pattern::{Pattern, Segment, WILDCARD_KEY};
pub use service::RouterService;
pub use walk::{walk, Route, RouteHandler, Routes};

/// The future returned by handlers and middleware.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket
/// impl below, and so does [`RouterService`].
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> BoxFuture;

    /// A name for route documentation; the implementing type's name by
    /// default, which for a function handler is the function's path.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        Box::pin((self)(ctx))
    }
}

/// Type-erased, cheaply cloneable handler.
pub type Handler = Arc<dyn IntoHandler>;

/// The route registration API shared by [`Mux`] and [`InlineMux`].
///
/// # Panics
///
/// Registration methods panic on programming errors: a malformed pattern,
/// mounting onto an existing path, an unregistered method, or middleware
/// added after routes. The panic message is `rmux: ` followed by the
/// [`RouterError`] description.
pub trait Router {
    /// Appends a middleware to the router's stack.
    ///
    /// # Panics
    ///
    /// Panics if routes were already registered on this router.
    fn use_middleware(&mut self, middleware: impl Middleware);

    /// Returns an inline router that registers routes on this router's tree
    /// with `middleware` appended to the inline stack.
    fn with(&mut self, middleware: impl Middleware) -> InlineMux<'_>;

    /// Runs `f` with a fresh inline router, so middleware it adds only
    /// applies to the routes it registers.
    fn group(&mut self, f: impl FnOnce(&mut InlineMux<'_>));

    /// Builds a sub-router with `f` and mounts it at `pattern`.
    fn route(&mut self, pattern: &str, f: impl FnOnce(&mut Mux));

    /// Attaches `router` under `pattern`. Requests to `pattern`, `pattern/`
    /// and everything below reach the sub-router, which matches against the
    /// remainder of the path.
    ///
    /// # Panics
    ///
    /// Panics if something is already mounted on `pattern`.
    fn mount(&mut self, pattern: &str, router: Mux);

    /// Attaches an arbitrary handler under `pattern`, with the same path
    /// delegation as [`mount`](Self::mount).
    fn mount_handler(&mut self, pattern: &str, handler: impl IntoHandler);

    /// Registers `handler` for every method on `pattern`.
    fn handle(&mut self, pattern: &str, handler: impl IntoHandler);

    /// Registers `handler` for `method` on `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `method` is an extension method that was never registered.
    fn on(&mut self, method: Method, pattern: &str, handler: impl IntoHandler);

    /// Sets the handler for requests matching no route.
    fn not_found(&mut self, handler: impl IntoHandler);

    /// Sets the handler for requests whose path matched only for other
    /// methods.
    fn method_not_allowed(&mut self, handler: impl IntoHandler);

    /// Registers `handler` for the method named `method` (case-insensitive).
    ///
    /// # Panics
    ///
    /// Panics if `method` is neither standard nor registered through
    /// [`register_method`].
    fn method(&mut self, method: &str, pattern: &str, handler: impl IntoHandler) {
        match methods::parse_registered(method) {
            Ok(method) => self.on(method, pattern, handler),
            Err(err) => error::fatal(err),
        }
    }

    fn connect(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Connect, pattern, handler);
    }

    fn delete(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Delete, pattern, handler);
    }

    fn get(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Get, pattern, handler);
    }

    fn head(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Head, pattern, handler);
    }

    fn options(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Options, pattern, handler);
    }

    fn patch(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Patch, pattern, handler);
    }

    fn post(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Post, pattern, handler);
    }

    fn put(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Put, pattern, handler);
    }

    fn trace(&mut self, pattern: &str, handler: impl IntoHandler) {
        self.on(Method::Trace, pattern, handler);
    }
}
