//! The [`Responder`]: what a handler decided, before it hits the wire.
//!
//! Business logic returns a `Responder`; the framework calls
//! [`Responder::respond`] exactly once to turn it into a [`Response`].
//! Because `respond` takes `self` by value, a responder cannot be written
//! twice.
//!
//! ```rust
//! use http::StatusCode;
//! use quire::{Cookie, Responder};
//!
//! # #[derive(serde::Serialize)] struct Post { title: String }
//! # let post = Post { title: "hello".into() };
//! Responder::json(&post)
//!     .with_status(StatusCode::CREATED)
//!     .with_header("location", "/api/v1/posts/42")
//!     .with_cookie(Cookie::new("seen", "1").path("/"));
//!
//! # let err = std::io::Error::other("connection reset");
//! Responder::json_error(StatusCode::NOT_FOUND, "Post not found").caused_by(err);
//! ```

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, LOCATION, SET_COOKIE, X_CONTENT_TYPE_OPTIONS};
use http::StatusCode;
use serde::Serialize;
use tracing::{Span, error, info, warn};

use crate::response::{JSON, Response, TEXT};

/// Boxed internal cause of an error response. Logged, never sent.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
const INTERNAL_SERVER_ERROR_JSON: &[u8] = br#"{"error":"Internal Server Error"}"#;

// ── Responder ────────────────────────────────────────────────────────────────

/// A handler result that knows how to render itself as an HTTP response.
#[must_use]
pub struct Responder {
    kind: Kind,
    status: StatusCode,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    logger: Option<Span>,
}

enum Kind {
    Json(Result<Vec<u8>, serde_json::Error>),
    JsonError { message: String, cause: Option<Cause> },
    Text(String),
    TextError { message: String, cause: Option<Cause> },
    Redirect(String),
    Empty,
}

impl Responder {
    fn new(kind: Kind, status: StatusCode) -> Self {
        Self { kind, status, headers: Vec::new(), cookies: Vec::new(), logger: None }
    }

    /// `200 OK` with `data` serialised as JSON.
    ///
    /// Serialisation happens here; if it fails, [`respond`](Self::respond)
    /// writes a fixed `500 {"error":"Internal Server Error"}` instead.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Self {
        Self::new(Kind::Json(serde_json::to_vec(data)), StatusCode::OK)
    }

    /// `{"error": message}` at `status`.
    pub fn json_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(Kind::JsonError { message: message.into(), cause: None }, status)
    }

    /// `500 {"error":"Internal Server Error"}`, whatever `cause` says.
    pub fn internal_server_error(cause: impl Into<Cause>) -> Self {
        Self::json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR).caused_by(cause)
    }

    /// `200 OK`, `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Kind::Text(body.into()), StatusCode::OK)
    }

    /// Plain-text error: `message` plus a trailing newline at `status`.
    pub fn text_error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(Kind::TextError { message: message.into(), cause: None }, status)
    }

    /// Plain-text `500 Internal Server Error`, whatever `cause` says.
    pub fn text_internal_server_error(cause: impl Into<Cause>) -> Self {
        Self::text_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR).caused_by(cause)
    }

    /// Redirect to `url` with `status` (301, 302, 303, 307 or 308).
    pub fn redirect(url: impl Into<String>, status: StatusCode) -> Self {
        Self::new(Kind::Redirect(url.into()), status)
    }

    /// `200 OK` with no body. Distinct from returning `None`, which is a 204.
    pub fn empty() -> Self {
        Self::new(Kind::Empty, StatusCode::OK)
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self::new(Kind::Empty, StatusCode::NO_CONTENT)
    }

    // ── Refinements ──────────────────────────────────────────────────────────

    /// Appends a header. Repeated names are kept, in insertion order.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Logs the outcome inside `span` when the responder is written.
    pub fn with_logger(mut self, span: Span) -> Self {
        self.logger = Some(span);
        self
    }

    /// Attaches the internal cause of an error variant. Ignored on success
    /// variants.
    pub fn caused_by(mut self, err: impl Into<Cause>) -> Self {
        if let Kind::JsonError { cause, .. } | Kind::TextError { cause, .. } = &mut self.kind {
            *cause = Some(err.into());
        }
        self
    }

    pub fn status(&self) -> StatusCode { self.status }

    // ── Writing ──────────────────────────────────────────────────────────────

    /// Renders the responder. Consumes it: one responder, one response.
    pub fn respond(self) -> Response {
        let Self { kind, status, headers, cookies, logger } = self;
        let mut res = Response::status(status);

        for (name, value) in &headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    res.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, "skipping invalid response header"),
            }
        }
        for cookie in &cookies {
            match HeaderValue::try_from(cookie.to_string()) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(_) => warn!(cookie = %cookie.name, "skipping invalid cookie"),
            }
        }

        let span = logger.unwrap_or_else(Span::none);
        let _entered = span.enter();
        let logged = !span.is_none();

        match kind {
            Kind::Json(Ok(body)) => {
                res.set_body(JSON, body);
                if logged {
                    info!(status_code = status.as_u16(), response_body = %lossy(res.body()), "Sent HTTP response");
                }
            }
            Kind::Json(Err(err)) => {
                // Overrides whatever status the caller chose.
                res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                res.set_body(JSON, Bytes::from_static(INTERNAL_SERVER_ERROR_JSON));
                if logged {
                    error!(error = %err, "Failed to encode JSON response");
                }
            }
            Kind::JsonError { message, cause } => {
                let body = serde_json::json!({ "error": message }).to_string();
                if logged {
                    if let Some(cause) = &cause {
                        error!(error = %cause, "Sent error HTTP response");
                    }
                    info!(status_code = status.as_u16(), response_body = %body, "Sent HTTP response");
                }
                res.set_body(JSON, body);
            }
            Kind::Text(body) => {
                if logged {
                    info!(status_code = status.as_u16(), response_body = %body, "Sent HTTP response");
                }
                res.set_body(TEXT, body);
            }
            Kind::TextError { message, cause } => {
                if logged {
                    if let Some(cause) = &cause {
                        error!(error = %cause, "Error handling request");
                    }
                    info!(status_code = status.as_u16(), response_body = %message, "Sent HTTP response");
                }
                write_error(&mut res, &message);
            }
            Kind::Redirect(url) => {
                match HeaderValue::try_from(url.as_str()) {
                    Ok(location) => {
                        res.headers_mut().insert(LOCATION, location);
                    }
                    Err(_) => warn!(redirect_url = %url, "redirect target is not a valid header value"),
                }
                if logged {
                    info!(status_code = status.as_u16(), redirect_url = %url, "Sent HTTP redirect");
                }
            }
            Kind::Empty => {
                if logged {
                    info!(status_code = status.as_u16(), "Sent HTTP response");
                }
            }
        }

        res
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Json(_) => "json",
            Kind::JsonError { .. } => "json_error",
            Kind::Text(_) => "text",
            Kind::TextError { .. } => "text_error",
            Kind::Redirect(_) => "redirect",
            Kind::Empty => "empty",
        };
        f.debug_struct("Responder")
            .field("kind", &kind)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Generic "status + message" writer shared by plain-text errors.
pub(crate) fn write_error(res: &mut Response, message: &str) {
    res.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    res.set_body(TEXT, format!("{message}\n"));
}

fn lossy(body: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(body)
}

// ── Cookie ───────────────────────────────────────────────────────────────────

/// `SameSite` cookie attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// A `Set-Cookie` value attached with [`Responder::with_cookie`].
#[derive(Clone, Debug)]
pub struct Cookie {
    name: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Seconds until expiry. Zero or negative deletes the cookie.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        match self.max_age {
            Some(age) if age > 0 => write!(f, "; Max-Age={age}")?,
            Some(_) => f.write_str("; Max-Age=0")?,
            None => {}
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        match self.same_site {
            Some(SameSite::Strict) => f.write_str("; SameSite=Strict")?,
            Some(SameSite::Lax) => f.write_str("; SameSite=Lax")?,
            Some(SameSite::None) => f.write_str("; SameSite=None")?,
            None => {}
        }
        Ok(())
    }
}
