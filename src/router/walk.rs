//! Route introspection.

use std::collections::BTreeMap;

use super::tree::{MethodSlot, Node};
use super::{methods, Handler};
use crate::context::RouteContext;
use crate::http::Method;
use crate::middleware::MiddlewareHandler;

/// Read access to the routes of a router, frozen or not.
pub trait Routes {
    /// Lists every registered pattern of this router, without descending into
    /// mounted routers.
    fn routes(&self) -> Vec<Route<'_>>;

    /// The router-wide middleware stack.
    fn middlewares(&self) -> &[MiddlewareHandler];

    /// Looks `path` up for `method` without running anything.
    ///
    /// Params and patterns are recorded in `rctx` exactly as a real request
    /// would record them, descending through mounted routers.
    fn match_route(&self, rctx: &mut RouteContext, method: &Method, path: &str) -> bool;
}

/// One registered pattern and its handlers.
pub struct Route<'a> {
    pub pattern: &'a str,
    /// Handlers by method name. An all-methods registration appears under
    /// `*` and under every known method it serves.
    pub handlers: BTreeMap<String, RouteHandler<'a>>,
    /// The router mounted at this pattern, if any.
    pub subroutes: Option<&'a dyn Routes>,
}

#[derive(Clone, Copy)]
pub struct RouteHandler<'a> {
    /// The handler as stored, inline middleware included.
    pub handler: &'a Handler,
    /// The inline middleware the handler was registered with.
    pub middlewares: &'a [MiddlewareHandler],
}

pub(crate) fn tree_routes<'a, S>(
    tree: &'a Node<Handler, S>,
    subroutes: impl Fn(&'a S) -> &'a dyn Routes,
) -> Vec<Route<'a>> {
    let mut routes = Vec::new();
    tree.visit(&mut |node: &'a Node<Handler, S>| {
        let first = routes.len();
        for (slot, endpoint) in node.endpoints() {
            if endpoint.stub {
                continue;
            }
            let existing = routes[first..]
                .iter()
                .position(|route: &Route<'a>| route.pattern == endpoint.pattern);
            let idx = match existing {
                Some(offset) => first + offset,
                None => {
                    routes.push(Route {
                        pattern: endpoint.pattern.as_str(),
                        handlers: BTreeMap::new(),
                        subroutes: node.subroutes().map(&subroutes),
                    });
                    routes.len() - 1
                }
            };

            let entry = RouteHandler {
                handler: &endpoint.handler,
                middlewares: &endpoint.middlewares,
            };
            let handlers = &mut routes[idx].handlers;
            match slot {
                MethodSlot::All => {
                    handlers.insert("*".to_owned(), entry);
                    for method in methods::known_methods() {
                        handlers.entry(method.as_str().to_owned()).or_insert(entry);
                    }
                }
                MethodSlot::Exact(method) => {
                    handlers.insert(method.as_str().to_owned(), entry);
                }
            }
        }
    });
    routes
}

pub(crate) fn match_tree<'a, S>(
    tree: &'a Node<Handler, S>,
    subroutes: impl Fn(&'a S) -> &'a dyn Routes,
    rctx: &mut RouteContext,
    method: &Method,
    path: &str,
) -> bool {
    if !methods::is_registered(method) {
        return false;
    }
    let Some((node, _)) = tree.find(rctx, method, path) else {
        return false;
    };
    match node.subroutes() {
        Some(sub) => {
            let next = rctx.next_route_path();
            rctx.set_route_path(next.as_str());
            subroutes(sub).match_route(rctx, method, &next)
        }
        None => true,
    }
}

/// Visits every route reachable from `routes`, mounted routers included.
///
/// `f` receives the method, the full route pattern, the handler, and the
/// middleware that applies to it: every ancestor router's stack, then the
/// handler's own inline middleware. Mount wildcards are collapsed, so a
/// handler at `/` inside a router mounted at `/api` is reported as `/api/`.
/// Iteration stops at the first error.
///
/// ```
/// use rmux::router::{walk, Mux, Router};
/// use rmux::{Response, StatusCode, context::Context};
///
/// let mut users = Mux::new();
/// users.get("/{id}", |_: Context| async { Response::new(StatusCode::Ok) });
/// let mut root = Mux::new();
/// root.mount("/users", users);
///
/// let mut seen = Vec::new();
/// walk(&root, |method, route, _, _| {
///     seen.push(format!("{method} {route}"));
///     Ok::<_, ()>(())
/// })
/// .unwrap();
/// assert_eq!(seen, ["GET /users/{id}"]);
/// ```
pub fn walk<E, F>(routes: &dyn Routes, mut f: F) -> Result<(), E>
where
    F: FnMut(&str, &str, &Handler, &[MiddlewareHandler]) -> Result<(), E>,
{
    walk_level(routes, &mut f, "", &[])
}

type WalkFn<'f, E> = dyn FnMut(&str, &str, &Handler, &[MiddlewareHandler]) -> Result<(), E> + 'f;

fn walk_level<E>(
    routes: &dyn Routes,
    f: &mut WalkFn<'_, E>,
    parent_route: &str,
    parent_middlewares: &[MiddlewareHandler],
) -> Result<(), E> {
    let mut middlewares = parent_middlewares.to_vec();
    middlewares.extend_from_slice(routes.middlewares());

    for route in routes.routes() {
        let full = format!("{parent_route}{}", route.pattern);

        if let Some(sub) = route.subroutes {
            let mut inherited = middlewares.clone();
            if let Some(entry) = route.handlers.values().next() {
                inherited.extend_from_slice(entry.middlewares);
            }
            walk_level(sub, f, &full, &inherited)?;
            continue;
        }

        let reported = full.replace("/*/", "/");
        for (method, entry) in &route.handlers {
            if method == "*" {
                continue;
            }
            let mut all = middlewares.clone();
            all.extend_from_slice(entry.middlewares);
            f(method, &reported, entry.handler, &all)?;
        }
    }
    Ok(())
}
