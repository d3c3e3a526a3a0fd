//! Radix-tree request router and the assembled [`App`].
//!
//! One tree per HTTP method. O(path-length) lookup. A path that matches no
//! tree is a `404`; a path that matches under a different method is a
//! `405` with an `Allow` header.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::responder::Responder;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup, stack middleware with [`Router::layer`], then
/// freeze it with [`Router::into_app`] and hand the [`App`] to
/// [`Server::serve`](crate::Server::serve). Every registration returns
/// `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use quire::{Request, Responder, Router};
    /// # use http::Method;
    /// # async fn get_post(_: Request) -> Responder { Responder::empty() }
    /// Router::new().on(Method::GET, "/api/v1/posts/{id}", get_post);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with an
    /// existing route for the same method. Routes are fixed at startup, so
    /// this is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Wraps every route in `middleware`. The first layer added is the
    /// outermost.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Freezes the routing table and middleware into an [`App`].
    pub fn into_app(self) -> App {
        App {
            chain: self.middleware.into(),
            endpoint: Arc::new(Dispatch { routes: self.routes }),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// The innermost link of the chain: route lookup and handler call.
struct Dispatch {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Dispatch {
    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Methods under which `path` is routable, for `405` answers.
    fn allowed(&self, path: &str) -> Vec<&str> {
        let mut methods: Vec<&str> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();
        methods.sort_unstable();
        methods
    }
}

impl ErasedHandler for Dispatch {
    fn call(&self, mut req: Request) -> BoxFuture {
        if let Some((handler, params)) = self.lookup(req.method(), req.path()) {
            req.set_params(params);
            return handler.call(req);
        }

        let allowed = self.allowed(req.path());
        let res = if allowed.is_empty() {
            Responder::text_error(StatusCode::NOT_FOUND, "404 page not found").respond()
        } else {
            let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                res.headers_mut().insert(ALLOW, value);
            }
            res
        };
        Box::pin(std::future::ready(res))
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// A frozen router: middleware chain plus routing table. Cheap to share
/// behind an `Arc` across connection tasks.
pub struct App {
    chain: Arc<[Arc<dyn Middleware>]>,
    endpoint: BoxedHandler,
}

impl App {
    /// Runs one request through the middleware chain and the router.
    pub async fn call(&self, req: Request) -> Response {
        Next::new(Arc::clone(&self.chain), Arc::clone(&self.endpoint)).run(req).await
    }

    /// Convenience for tests and embedding: runs an `http::Request` whose
    /// body is already buffered.
    pub async fn oneshot(&self, req: http::Request<Bytes>) -> Response {
        self.call(Request::from_http(req)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    fn app() -> App {
        Router::new()
            .get("/posts/{id}", |req: Request| async move {
                req.param("id").unwrap_or("missing").to_owned()
            })
            .delete("/posts/{id}", |_req: Request| async { Responder::empty() })
            .into_app()
    }

    #[tokio::test]
    async fn extracts_path_params() {
        let res = app().oneshot(get("/posts/42")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"42");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let res = app().oneshot(get("/nope")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"404 page not found\n");
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_allow() {
        let req = http::Request::builder().method("PUT").uri("/posts/1").body(Bytes::new()).unwrap();
        let res = app().oneshot(req).await;
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("allow"), Some("DELETE, GET"));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let noop = |_req: Request| async {};
        let _ = Router::new().get("/posts/{id}", noop).get("/posts/{slug}", noop);
    }
}
