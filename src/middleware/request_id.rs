//! Request id assignment.

use http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Header carrying the request id in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The id of the current request, stored in the request extensions.
///
/// Read it with [`Request::request_id`](crate::Request::request_id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reuses an inbound `x-request-id` when the client sent a usable one,
/// otherwise generates a UUID v4. The id is echoed on the response.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestIdLayer;

impl Middleware for RequestIdLayer {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        let id = req
            .header(X_REQUEST_ID.as_str())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
        req.extensions_mut().insert(RequestId(id.clone()));

        Box::pin(async move {
            let mut res = next.run(req).await;
            if let Ok(value) = HeaderValue::try_from(id) {
                res.headers_mut().insert(X_REQUEST_ID, value);
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;

    async fn run(req: http::Request<Bytes>) -> (String, Option<String>) {
        let endpoint = (|req: Request| async move {
            req.request_id().unwrap_or_default().to_owned()
        })
        .into_boxed_handler();
        let chain: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(RequestIdLayer) as Arc<dyn Middleware>]);
        let res = Next::new(chain, endpoint).run(Request::from_http(req)).await;
        let seen = String::from_utf8(res.body().to_vec()).unwrap();
        (seen, res.header("x-request-id").map(str::to_owned))
    }

    #[tokio::test]
    async fn propagates_inbound_id() {
        let req = http::Request::builder().header("x-request-id", "abc-123").body(Bytes::new()).unwrap();
        let (seen, echoed) = run(req).await;
        assert_eq!(seen, "abc-123");
        assert_eq!(echoed.as_deref(), Some("abc-123"));
    }

    #[tokio::test]
    async fn generates_uuid_when_missing() {
        let (seen, echoed) = run(http::Request::new(Bytes::new())).await;
        assert!(Uuid::parse_str(&seen).is_ok());
        assert_eq!(echoed, Some(seen));
    }
}
