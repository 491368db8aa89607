//! # rmux
//!
//! An async HTTP request router: a prefix-tree multiplexer with URL params,
//! regex constraints, wildcards, middleware stacks, inline groups and
//! mountable sub-routers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rmux::context::Context;
//! use rmux::middleware::Logger;
//! use rmux::router::{Mux, Router};
//! use rmux::server::Server;
//! use rmux::{Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut mux = Mux::new();
//!     mux.use_middleware(Logger);
//!     mux.get("/", |_: Context| async {
//!         Response::new(StatusCode::Ok).body("Hello, World!")
//!     });
//!     mux.route("/users", |users| {
//!         users.get("/{id:[0-9]+}", |ctx: Context| async move {
//!             let id = ctx.param("id").unwrap_or_default().to_owned();
//!             Response::new(StatusCode::Ok).body(id)
//!         });
//!     });
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.serve(mux.into_service()).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod docgen;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{Handler, IntoHandler, Mux, Router, RouterService};
pub use server::{Server, ServerError};
