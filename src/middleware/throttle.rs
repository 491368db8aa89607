use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::{Response, StatusCode};
use crate::router::BoxFuture;

const ERR_CAPACITY_EXCEEDED: &str = "Server capacity exceeded.";
const ERR_TIMED_OUT: &str = "Timed out while waiting for a pending request to complete.";
const ERR_CONTEXT_CANCELED: &str = "Context was canceled.";

const DEFAULT_BACKLOG_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for [`Throttle`].
#[derive(Debug, Clone)]
pub struct ThrottleOptions {
    /// Requests processed at the same time.
    pub limit: usize,
    /// Requests allowed to wait for a free slot.
    pub backlog_limit: usize,
    /// How long a waiting request may wait.
    pub backlog_timeout: Duration,
    /// Value of the `Retry-After` header on rejections.
    pub retry_after: Option<Duration>,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            backlog_limit: 0,
            backlog_timeout: DEFAULT_BACKLOG_TIMEOUT,
            retry_after: None,
        }
    }
}

/// Caps the number of requests in flight past this point.
///
/// This is not a per-client rate limiter: it puts a ceiling on concurrent
/// work across every request reaching the router it is installed on. Up to
/// `limit` requests run; up to `backlog_limit` more wait for a slot for at most
/// `backlog_timeout`; the rest get `429 Too Many Requests` immediately.
/// A waiting request whose cancellation token fires also gets `429`.
#[derive(Debug, Clone)]
pub struct Throttle {
    tokens: Arc<Semaphore>,
    backlog: Arc<Semaphore>,
    backlog_timeout: Duration,
    retry_after: Option<Duration>,
}

impl Throttle {
    /// Allows `limit` concurrent requests and no backlog.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn new(limit: usize) -> Self {
        Self::with_options(ThrottleOptions {
            limit,
            ..ThrottleOptions::default()
        })
    }

    /// Allows `limit` concurrent requests and `backlog_limit` waiting ones.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn with_backlog(limit: usize, backlog_limit: usize, backlog_timeout: Duration) -> Self {
        Self::with_options(ThrottleOptions {
            limit,
            backlog_limit,
            backlog_timeout,
            retry_after: None,
        })
    }

    /// # Panics
    ///
    /// Panics if `options.limit` is zero.
    pub fn with_options(options: ThrottleOptions) -> Self {
        assert!(options.limit > 0, "rmux: Throttle expects limit > 0");
        Self {
            tokens: Arc::new(Semaphore::new(options.limit)),
            backlog: Arc::new(Semaphore::new(options.limit + options.backlog_limit)),
            backlog_timeout: options.backlog_timeout,
            retry_after: options.retry_after,
        }
    }

    fn reject(&self, message: &str) -> Response {
        let response = Response::new(StatusCode::TooManyRequests).body(message);
        match self.retry_after {
            Some(after) => response.header("Retry-After", after.as_secs().to_string()),
            None => response,
        }
    }
}

impl Middleware for Throttle {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move {
            let token = ctx.cancellation().clone();
            if token.is_cancelled() {
                return this.reject(ERR_CONTEXT_CANCELED);
            }

            let Ok(_backlog) = Arc::clone(&this.backlog).try_acquire_owned() else {
                return this.reject(ERR_CAPACITY_EXCEEDED);
            };

            tokio::select! {
                permit = Arc::clone(&this.tokens).acquire_owned() => match permit {
                    Ok(_permit) => next.run(ctx).await,
                    Err(_) => this.reject(ERR_CAPACITY_EXCEEDED),
                },
                () = tokio::time::sleep(this.backlog_timeout) => this.reject(ERR_TIMED_OUT),
                () = token.cancelled() => this.reject(ERR_CONTEXT_CANCELED),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::http::{Method, Request};
    use crate::middleware::{chain, from_middleware};
    use crate::router::Handler;

    fn gated(throttle: Throttle, gate: Arc<Notify>) -> Handler {
        chain(
            &[from_middleware(throttle)],
            Arc::new(move |_: Context| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Response::new(StatusCode::Ok)
                }
            }),
        )
    }

    fn ctx() -> Context {
        Context::new(Request::new(Method::Get, "/"))
    }

    #[test]
    #[should_panic(expected = "Throttle expects limit > 0")]
    fn zero_limit_panics() {
        let _ = Throttle::new(0);
    }

    #[tokio::test]
    async fn rejects_over_capacity() {
        let gate = Arc::new(Notify::new());
        let h = gated(Throttle::new(1), Arc::clone(&gate));

        let busy = tokio::spawn({
            let h = Arc::clone(&h);
            async move { h.call(ctx()).await }
        });
        tokio::task::yield_now().await;

        let rejected = h.call(ctx()).await;
        assert_eq!(rejected.status(), StatusCode::TooManyRequests);
        assert_eq!(rejected.text(), ERR_CAPACITY_EXCEEDED);

        gate.notify_one();
        assert_eq!(busy.await.unwrap().status(), StatusCode::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_times_out() {
        let gate = Arc::new(Notify::new());
        let throttle = Throttle::with_options(ThrottleOptions {
            limit: 1,
            backlog_limit: 1,
            backlog_timeout: Duration::from_millis(100),
            retry_after: Some(Duration::from_secs(3)),
        });
        let h = gated(throttle, Arc::clone(&gate));

        let busy = tokio::spawn({
            let h = Arc::clone(&h);
            async move { h.call(ctx()).await }
        });
        tokio::task::yield_now().await;

        let waited = h.call(ctx()).await;
        assert_eq!(waited.status(), StatusCode::TooManyRequests);
        assert_eq!(waited.text(), ERR_TIMED_OUT);
        assert_eq!(waited.headers().get("retry-after"), Some("3"));

        gate.notify_one();
        assert_eq!(busy.await.unwrap().status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn cancelled_request_is_rejected() {
        let h = gated(Throttle::new(1), Arc::new(Notify::new()));
        let token = CancellationToken::new();
        token.cancel();
        let response = h
            .call(Context::with_cancellation(Request::new(Method::Get, "/"), token))
            .await;
        assert_eq!(response.text(), ERR_CONTEXT_CANCELED);
    }
}
