//! # quire
//!
//! A small JSON service for blog posts, plus two read-only proxies to
//! third-party APIs, built on a thin request-handling core.
//!
//! ## The core
//!
//! - **Handlers** are plain async functions. Ones that need a decoded body
//!   go through [`handler::with_input`]; a body that does not decode is
//!   answered with `400 Invalid request payload` before the handler runs.
//! - **[`Responder`]** is what a handler decided: JSON, JSON error, plain
//!   text, redirect, or an explicit empty body. It is written exactly once.
//!   Internal causes are logged, never sent.
//! - **Middleware** wraps dispatch, outermost first: request id, access log,
//!   panic recovery, timeout, CORS.
//! - **Routing**: radix tree per method via [`matchit`], with path
//!   parameters, `404` and `405` fallbacks.
//! - **Graceful shutdown**: SIGTERM / Ctrl-C stop the accept loop and drain
//!   in-flight connections within a bounded grace period.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use quire::{Request, Responder, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), quire::Error> {
//!     let app = Router::new()
//!         .get("/hello/{name}", hello)
//!         .into_app();
//!
//!     let server = Server::bind("0.0.0.0:3000".parse().unwrap()).await?;
//!     server.serve(app, async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//!
//! async fn hello(req: Request) -> Responder {
//!     match req.param("name") {
//!         Some(name) => Responder::text(format!("hello, {name}")),
//!         None => Responder::json_error(StatusCode::BAD_REQUEST, "who?"),
//!     }
//! }
//! ```
//!
//! The binary wires everything together in [`lifecycle::run`].

mod error;
mod request;
mod responder;
mod response;
mod router;
mod server;

pub mod api;
pub mod config;
pub mod handler;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod store;

pub use error::Error;
pub use handler::Handler;
pub use request::Request;
pub use responder::{Cause, Cookie, Responder, SameSite};
pub use response::{IntoResponse, Response};
pub use router::{App, Router};
pub use server::Server;
