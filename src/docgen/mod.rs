//! Route documentation.
//!
//! Walks a router, mounted routers included, into a serializable tree that
//! names every middleware and handler by its type path.
//!
//! ```
//! use rmux::docgen;
//! use rmux::router::{Mux, Router};
//! use rmux::{Response, StatusCode, context::Context};
//!
//! async fn list_users(_: Context) -> Response {
//!     Response::new(StatusCode::Ok)
//! }
//!
//! let mut mux = Mux::new();
//! mux.get("/users", list_users);
//!
//! let json = docgen::json_routes_doc(&mux).unwrap();
//! assert!(json.contains("list_users"));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::middleware::MiddlewareHandler;
use crate::router::Routes;

#[derive(Debug, Clone, Serialize)]
pub struct RoutesDoc {
    pub router: RouterDoc,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterDoc {
    pub middlewares: Vec<String>,
    pub routes: BTreeMap<String, RouteDoc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteDoc {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub handlers: BTreeMap<String, HandlerDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<Box<RouterDoc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerDoc {
    /// Inline middleware, outermost first.
    pub middlewares: Vec<String>,
    pub handler: String,
}

/// Documents `routes` and everything mounted into it.
pub fn routes_doc(routes: &dyn Routes) -> RoutesDoc {
    RoutesDoc {
        router: router_doc(routes),
    }
}

/// [`routes_doc`] rendered as pretty-printed JSON.
pub fn json_routes_doc(routes: &dyn Routes) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&routes_doc(routes))
}

fn router_doc(routes: &dyn Routes) -> RouterDoc {
    let mut doc = RouterDoc {
        middlewares: names(routes.middlewares()),
        routes: BTreeMap::new(),
    };

    for route in routes.routes() {
        let mut route_doc = RouteDoc {
            handlers: BTreeMap::new(),
            router: None,
        };

        if let Some(sub) = route.subroutes {
            route_doc.router = Some(Box::new(router_doc(sub)));
        } else {
            let all = route.handlers.get("*").map(|entry| entry.handler);
            for (method, entry) in &route.handlers {
                // methods served by the all-methods handler are listed once, as `*`
                let covered = all.is_some_and(|all| Arc::ptr_eq(all, entry.handler));
                if method != "*" && covered {
                    continue;
                }
                route_doc.handlers.insert(
                    method.clone(),
                    HandlerDoc {
                        middlewares: names(entry.middlewares),
                        handler: entry.handler.name().to_owned(),
                    },
                );
            }
        }

        doc.routes.insert(route.pattern.to_owned(), route_doc);
    }

    doc
}

fn names(middlewares: &[MiddlewareHandler]) -> Vec<String> {
    middlewares
        .iter()
        .map(|middleware| middleware.name().to_owned())
        .collect()
}
