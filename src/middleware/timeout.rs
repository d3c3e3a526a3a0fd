//! Per-request deadline.

use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Bounds the time spent downstream.
///
/// When the limit passes, the downstream future is dropped, which cancels
/// any store query or upstream call still in flight, and the client gets
/// `504 Gateway Timeout` with no body.
#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    limit: Duration,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl Middleware for Timeout {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let limit = self.limit;
        let span = req.span().clone();
        Box::pin(async move {
            match tokio::time::timeout(limit, next.run(req)).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(parent: &span, limit = ?limit, "request timed out");
                    Response::status(StatusCode::GATEWAY_TIMEOUT)
                }
            }
        })
    }
}
