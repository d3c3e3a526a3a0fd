//! Middleware layer.
//!
//! Middleware wraps the router and is the place for cross-cutting concerns.
//! A middleware receives the request and a [`Next`] handle; it may answer on
//! its own or call [`Next::run`] and post-process the response.
//!
//! Registration order is nesting order: the first middleware passed to
//! [`Router::layer`](crate::Router::layer) is the outermost.
//!
//! Built-in middleware, in the order the service stacks them:
//! - [`RequestIdLayer`]: assign or propagate `x-request-id`
//! - [`AccessLog`]: request span, `START` / `END` records with status and latency
//! - [`Recover`]: turn a panicking handler into a 500
//! - [`Timeout`]: bound the time spent downstream
//! - [`Cors`]: cross-origin policy and preflight answers

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;

mod access_log;
mod cors;
mod recover;
mod request_id;
mod timeout;

pub use access_log::AccessLog;
pub use cors::Cors;
pub use recover::Recover;
pub use request_id::{RequestId, RequestIdLayer, X_REQUEST_ID};
pub use timeout::Timeout;

/// A request interceptor.
///
/// Implementations return a boxed future so they can be stored as trait
/// objects; copy whatever configuration the future needs out of `self`
/// before the `async move` block.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

/// The rest of the chain after the current middleware.
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>, endpoint: BoxedHandler) -> Self {
        Self { chain, position: 0, endpoint }
    }

    /// Passes the request to the next middleware, or to the router once the
    /// chain is exhausted.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.chain.get(self.position).cloned() {
            Some(middleware) => {
                let next = Self { position: self.position + 1, ..self };
                middleware.handle(req, next)
            }
            None => self.endpoint.call(req),
        }
    }
}
