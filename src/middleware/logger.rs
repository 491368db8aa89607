use tokio::time::Instant;

use super::{Middleware, Next};
use crate::context::Context;
use crate::router::BoxFuture;

/// Logs each request's method, path, matched route pattern, status and
/// duration.
///
/// Emits a single `tracing::info!` event after the downstream handler
/// completes. Does not short-circuit.
///
/// ```rust,no_run
/// use rmux::middleware::Logger;
/// use rmux::router::{Mux, Router};
///
/// let mut mux = Mux::new();
/// mux.use_middleware(Logger);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Middleware for Logger {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_owned();
            let remote = ctx.request().remote_addr();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                route = response.route_pattern().unwrap_or_default(),
                remote = ?remote,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}
