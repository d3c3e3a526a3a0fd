//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Handlers rarely build a [`Response`] by hand. They return a
//! [`Responder`](crate::Responder), which renders itself into one. The
//! [`Response`] is the wire-level value the server finally hands to hyper.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::responder::Responder;

// ── Content types ─────────────────────────────────────────────────────────────

pub(crate) const JSON: &str = "application/json";
pub(crate) const TEXT: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response: status, headers, fully buffered body.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// `200 OK`, `application/json`. The bytes are sent as-is.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::with_body(StatusCode::OK, JSON, body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_body(StatusCode::OK, TEXT, body.into())
    }

    pub(crate) fn with_body(
        status: StatusCode,
        content_type: &'static str,
        body: impl Into<Bytes>,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self { status, headers, body: body.into() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup; `None` for missing or non-ASCII values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub(crate) fn set_status(&mut self, code: StatusCode) {
        self.status = code;
    }

    pub(crate) fn set_body(&mut self, content_type: &'static str, body: impl Into<Bytes>) {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = body.into();
    }

    /// Converts into the hyper-facing response.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Everything a handler may return implements this. `None` and `()` mean
/// "nothing to send" and become `204 No Content`; use
/// [`Responder::empty`] when you want a `200` with no body.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for Responder {
    fn into_response(self) -> Response { self.respond() }
}

impl<T: IntoResponse> IntoResponse for Option<T> {
    fn into_response(self) -> Response {
        match self {
            Some(inner) => inner.into_response(),
            None => Response::status(StatusCode::NO_CONTENT),
        }
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response { Response::status(StatusCode::NO_CONTENT) }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`StatusCode`] directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_and_unit_mean_no_content() {
        let none: Option<Response> = None;
        assert_eq!(none.into_response().status_code(), StatusCode::NO_CONTENT);
        assert_eq!(().into_response().status_code(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn text_sets_content_type() {
        let res = "pong".into_response();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some(TEXT));
        assert_eq!(res.body(), b"pong");
    }

    #[test]
    fn into_inner_keeps_status_and_headers() {
        let res = Response::json(r#"{"ok":true}"#).into_inner();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], JSON);
    }
}
