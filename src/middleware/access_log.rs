//! Structured access logging.

use std::time::Instant;

use tracing::{Instrument, field, info, info_span};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Opens a `request` span under the request's current logger, logs `START`
/// and `END`, and hands the span to everything downstream through
/// [`Request::span`](crate::Request::span).
#[derive(Clone, Copy, Debug, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        let start = Instant::now();
        let span = info_span!(
            parent: req.span(),
            "request",
            path = %req.path(),
            method = %req.method(),
            request_id = field::Empty,
        );
        if let Some(id) = req.request_id() {
            span.record("request_id", id);
        }

        let user_agent = req.header("user-agent").unwrap_or_default().to_owned();
        span.in_scope(|| info!(user_agent = %user_agent, "START"));
        req.set_span(span.clone());

        Box::pin(async move {
            let res = next.run(req).instrument(span.clone()).await;
            span.in_scope(|| {
                info!(
                    duration = ?start.elapsed(),
                    status = res.status_code().as_u16(),
                    "END"
                );
            });
            res
        })
    }
}
