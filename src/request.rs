//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};
use tracing::Span;

use crate::middleware::RequestId;

/// An incoming HTTP request with its body already buffered.
///
/// Besides the HTTP head and body, a request carries its own
/// [`Span`]: the request-scoped logger. The server seeds it with its
/// boundary span and [`AccessLog`](crate::middleware::AccessLog) narrows it
/// to a child span tagged with path, method and request id. Handlers log
/// through it instead of reaching for global state.
pub struct Request {
    head: Parts,
    body: Bytes,
    params: HashMap<String, String>,
    span: Span,
}

impl Request {
    pub(crate) fn new(head: Parts, body: Bytes, span: Span) -> Self {
        Self { head, body, params: HashMap::new(), span }
    }

    /// Builds a request from an `http::Request` with a buffered body.
    ///
    /// The server does this for you; it is public so custom decoders and
    /// tests can construct requests directly.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::new(head, body, Span::current())
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.head.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.head.extensions }

    /// Case-insensitive header lookup; `None` for missing or non-ASCII values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/posts/{id}`, `req.param("id")` on `/posts/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The id assigned by [`RequestId`](crate::middleware::RequestId), if that
    /// middleware ran.
    pub fn request_id(&self) -> Option<&str> {
        self.head.extensions.get::<RequestId>().map(RequestId::as_str)
    }

    /// The request-scoped logger.
    pub fn span(&self) -> &Span { &self.span }

    pub(crate) fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::from_http(
            http::Request::builder()
                .uri("/api/v1/posts?x=1")
                .header("User-Agent", "curl/8")
                .body(Bytes::new())
                .unwrap(),
        );
        assert_eq!(req.header("user-agent"), Some("curl/8"));
        assert_eq!(req.path(), "/api/v1/posts");
        assert!(req.request_id().is_none());
    }
}
