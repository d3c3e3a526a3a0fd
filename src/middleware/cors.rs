//! Cross-origin resource sharing.
//!
//! Requests without an `Origin` header are none of CORS's business and pass
//! straight through. A preflight (`OPTIONS` carrying
//! `Access-Control-Request-Method`) is answered here with `204` and never
//! reaches a handler. Disallowed origins get no CORS headers at all; the
//! browser does the refusing.

use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, HeaderMap, HeaderValue, ORIGIN, VARY,
};
use http::{Method, StatusCode};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// CORS policy. Credentials are never allowed.
#[derive(Clone, Debug)]
pub struct Cors {
    policy: Arc<Policy>,
}

#[derive(Debug)]
struct Policy {
    any_origin: bool,
    origins: Vec<String>,
    methods: Vec<Method>,
    headers: Vec<String>,
    exposed: Vec<String>,
    max_age: u32,
}

impl Cors {
    /// The service's policy: the given origins (`*` allows any), the CRUD
    /// methods, the usual request headers, `Link` exposed, five-minute
    /// preflight cache.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let origins: Vec<String> = origins.into_iter().map(Into::into).collect();
        Self {
            policy: Arc::new(Policy {
                any_origin: origins.iter().any(|o| o == "*"),
                origins: origins.into_iter().map(|o| o.to_ascii_lowercase()).collect(),
                methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS],
                headers: ["Accept", "Authorization", "Content-Type", "X-CSRF-Token"]
                    .into_iter()
                    .map(str::to_ascii_lowercase)
                    .collect(),
                exposed: vec!["Link".to_owned()],
                max_age: 300,
            }),
        }
    }
}

impl Policy {
    fn origin_allowed(&self, origin: &str) -> bool {
        self.any_origin || self.origins.iter().any(|o| o.eq_ignore_ascii_case(origin))
    }

    fn method_allowed(&self, method: &str) -> bool {
        // Preflight for OPTIONS itself is always fine.
        method.eq_ignore_ascii_case("OPTIONS")
            || self.methods.iter().any(|m| m.as_str().eq_ignore_ascii_case(method))
    }

    fn headers_allowed(&self, requested: &str) -> bool {
        requested
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .all(|h| h.eq_ignore_ascii_case("origin") || self.headers.iter().any(|a| a.eq_ignore_ascii_case(h)))
    }

    fn allow_origin_value(&self, origin: &str) -> Option<HeaderValue> {
        if self.any_origin {
            Some(HeaderValue::from_static("*"))
        } else {
            HeaderValue::from_str(origin).ok()
        }
    }

    fn preflight(&self, req: &Request) -> Response {
        let mut res = Response::status(StatusCode::NO_CONTENT);
        let headers = res.headers_mut();
        for vary in ["Origin", "Access-Control-Request-Method", "Access-Control-Request-Headers"] {
            headers.append(VARY, HeaderValue::from_static(vary));
        }

        let origin = req.header(ORIGIN.as_str()).unwrap_or_default();
        let method = req.header(ACCESS_CONTROL_REQUEST_METHOD.as_str()).unwrap_or_default();
        let requested = req.header(ACCESS_CONTROL_REQUEST_HEADERS.as_str()).unwrap_or_default();
        if !self.origin_allowed(origin) || !self.method_allowed(method) || !self.headers_allowed(requested) {
            return res;
        }

        if let Some(value) = self.allow_origin_value(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&method.to_ascii_uppercase()) {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if !requested.is_empty() {
            if let Ok(value) = HeaderValue::from_str(requested) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age));
        res
    }

    fn decorate(&self, origin: &str, method: &Method, headers: &mut HeaderMap) {
        headers.append(VARY, HeaderValue::from_static("Origin"));
        if !self.origin_allowed(origin) || !self.method_allowed(method.as_str()) {
            return;
        }
        if let Some(value) = self.allow_origin_value(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.exposed.join(", ")) {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }
    }
}

impl Middleware for Cors {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let policy = Arc::clone(&self.policy);

        let Some(origin) = req.header(ORIGIN.as_str()).map(str::to_owned) else {
            return next.run(req);
        };

        if *req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD) {
            let res = policy.preflight(&req);
            return Box::pin(std::future::ready(res));
        }

        let method = req.method().clone();
        Box::pin(async move {
            let mut res = next.run(req).await;
            policy.decorate(&origin, &method, res.headers_mut());
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;

    async fn run(cors: Cors, req: http::Request<Bytes>, reached: Arc<AtomicBool>) -> Response {
        let endpoint = (move |_req: Request| {
            reached.store(true, Ordering::SeqCst);
            async { "handled" }
        })
        .into_boxed_handler();
        let chain: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(cors) as Arc<dyn Middleware>]);
        Next::new(chain, endpoint).run(Request::from_http(req)).await
    }

    #[tokio::test]
    async fn preflight_is_answered_without_reaching_handler() {
        let reached = Arc::new(AtomicBool::new(false));
        let req = http::Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/posts")
            .header("origin", "https://app.example")
            .header("access-control-request-method", "put")
            .header("access-control-request-headers", "Content-Type")
            .body(Bytes::new())
            .unwrap();

        let res = run(Cors::new(["*"]), req, Arc::clone(&reached)).await;

        assert!(!reached.load(Ordering::SeqCst));
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.header("access-control-allow-methods"), Some("PUT"));
        assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type"));
        assert_eq!(res.header("access-control-max-age"), Some("300"));
        assert!(res.header("access-control-allow-credentials").is_none());
    }

    #[tokio::test]
    async fn actual_request_gets_exposed_headers() {
        let reached = Arc::new(AtomicBool::new(false));
        let req = http::Request::builder()
            .uri("/api/v1/posts")
            .header("origin", "https://app.example")
            .body(Bytes::new())
            .unwrap();

        let res = run(Cors::new(["https://app.example"]), req, Arc::clone(&reached)).await;

        assert!(reached.load(Ordering::SeqCst));
        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example"));
        assert_eq!(res.header("access-control-expose-headers"), Some("Link"));
        assert_eq!(res.header("vary"), Some("Origin"));
    }

    #[tokio::test]
    async fn disallowed_origin_gets_no_cors_headers() {
        let reached = Arc::new(AtomicBool::new(false));
        let req = http::Request::builder()
            .header("origin", "https://evil.example")
            .body(Bytes::new())
            .unwrap();

        let res = run(Cors::new(["https://app.example"]), req, reached).await;

        assert!(res.header("access-control-allow-origin").is_none());
        assert_eq!(res.body(), b"handled");
    }

    #[tokio::test]
    async fn no_origin_passes_through_untouched() {
        let reached = Arc::new(AtomicBool::new(false));
        let res = run(Cors::new(["*"]), http::Request::new(Bytes::new()), Arc::clone(&reached)).await;
        assert!(reached.load(Ordering::SeqCst));
        assert!(res.header("vary").is_none());
    }
}
