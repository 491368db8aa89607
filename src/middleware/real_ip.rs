use std::net::{IpAddr, SocketAddr};

use super::{Middleware, Next};
use crate::context::Context;
use crate::http::Request;
use crate::router::BoxFuture;

const X_REAL_IP: &str = "X-Real-IP";
const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Replaces the request's remote address with the one reported by a reverse
/// proxy: `X-Real-IP` first, then the first entry of `X-Forwarded-For`.
///
/// Only install this behind a proxy that overwrites those headers; otherwise
/// clients choose their own address. Put it early in the chain so later
/// middleware (loggers, throttles) see the rewritten address.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealIp;

impl Middleware for RealIp {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxFuture {
        if let Some(ip) = real_ip(ctx.request()) {
            let port = ctx.request().remote_addr().map_or(0, |addr| addr.port());
            ctx.request_mut().set_remote_addr(SocketAddr::new(ip, port));
        }
        Box::pin(next.run(ctx))
    }
}

fn real_ip(request: &Request) -> Option<IpAddr> {
    let headers = request.headers();
    let raw = match headers.get(X_REAL_IP) {
        Some(value) => value,
        None => headers.get(X_FORWARDED_FOR)?.split(',').next()?,
    };
    raw.trim().parse().ok()
}
