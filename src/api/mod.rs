//! The service's HTTP surface.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/ping` | [`health::ping`](crate::health::ping) |
//! | POST | `/api/v1/posts` | [`PostHandler::create`] |
//! | GET | `/api/v1/posts` | [`PostHandler::list`] |
//! | GET | `/api/v1/posts/{id}` | [`PostHandler::get`] |
//! | PUT | `/api/v1/posts/{id}` | [`PostHandler::update`] |
//! | DELETE | `/api/v1/posts/{id}` | [`PostHandler::delete`] |
//! | GET | `/api/v1/users` | [`users::list`] |
//! | GET | `/api/v1/quotes` | [`quotes::get`] |
//!
//! Every route runs behind, outermost first: request id, access log, panic
//! recovery, timeout, CORS.

use std::sync::Arc;
use std::time::Duration;

use crate::handler::with_input;
use crate::health;
use crate::middleware::{AccessLog, Cors, Recover, RequestIdLayer, Timeout};
use crate::router::Router;
use crate::Request;
use crate::store::PostStore;

pub mod posts;
pub mod quotes;
pub mod upstream;
pub mod users;

pub use posts::{CreatePostParams, PostHandler, UpdatePostParams};
pub use quotes::Quote;
pub use upstream::Upstream;
pub use users::{Address, User};

/// What the handlers talk to.
#[derive(Clone)]
pub struct Services {
    pub posts: Arc<dyn PostStore>,
    pub quotes: Upstream,
    pub users: Upstream,
}

/// Per-request policy applied by the middleware chain.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Budget for one request, from routing to the last body byte produced.
    pub request_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
}

/// Assembles middleware and routes.
pub fn router(services: Services, policy: &Policy) -> Router {
    let posts = Arc::new(PostHandler::new(services.posts));
    let quote_api = Arc::new(services.quotes);
    let user_api = Arc::new(services.users);

    Router::new()
        .layer(RequestIdLayer)
        .layer(AccessLog)
        .layer(Recover)
        .layer(Timeout::new(policy.request_timeout))
        .layer(Cors::new(&policy.cors_allowed_origins))
        .get("/ping", health::ping)
        .post("/api/v1/posts", {
            let h = Arc::clone(&posts);
            with_input(move |req: Request, params: CreatePostParams| {
                let h = Arc::clone(&h);
                async move { h.create(req, params).await }
            })
        })
        .get("/api/v1/posts", {
            let h = Arc::clone(&posts);
            move |req: Request| {
                let h = Arc::clone(&h);
                async move { h.list(req).await }
            }
        })
        .get("/api/v1/posts/{id}", {
            let h = Arc::clone(&posts);
            move |req: Request| {
                let h = Arc::clone(&h);
                async move { h.get(req).await }
            }
        })
        .put("/api/v1/posts/{id}", {
            let h = Arc::clone(&posts);
            with_input(move |req: Request, params: UpdatePostParams| {
                let h = Arc::clone(&h);
                async move { h.update(req, params).await }
            })
        })
        .delete("/api/v1/posts/{id}", move |req: Request| {
            let h = Arc::clone(&posts);
            async move { h.delete(req).await }
        })
        .get("/api/v1/users", move |req: Request| {
            let upstream = Arc::clone(&user_api);
            async move { users::list(&upstream, req).await }
        })
        .get("/api/v1/quotes", move |req: Request| {
            let upstream = Arc::clone(&quote_api);
            async move { quotes::get(&upstream, req).await }
        })
}
