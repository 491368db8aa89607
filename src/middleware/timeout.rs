use std::time::Duration;

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::{Response, StatusCode};
use crate::router::BoxFuture;

/// Bounds how long the rest of the chain may take.
///
/// When the deadline passes, the request's cancellation token is cancelled,
/// the downstream future is dropped, and the client receives
/// `504 Gateway Timeout`.
#[derive(Debug, Clone, Copy)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Middleware for Timeout {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let duration = self.duration;
        Box::pin(async move {
            let token = ctx.cancellation().clone();
            match tokio::time::timeout(duration, next.run(ctx)).await {
                Ok(response) => response,
                Err(_) => {
                    token.cancel();
                    tracing::debug!(timeout = ?duration, "request timed out");
                    Response::new(StatusCode::GatewayTimeout)
                }
            }
        })
    }
}
