//! Handler trait, type erasure, and the input-decoding adapters.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one table, so each
//! concrete handler is hidden behind a trait object (`dyn ErasedHandler`):
//!
//! ```text
//! async fn ping(req: Request) -> Responder { … }   ← user writes this
//!        ↓ router.get("/ping", ping)
//! ping.into_boxed_handler()                        ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(ping))                        ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { ping(req).await.into_response() })
//! ```
//!
//! # Handlers that take a decoded input
//!
//! [`with_input`] and [`with_decoder`] wrap `async fn(Request, T)` so it can
//! be registered like any other handler. The body is decoded before the
//! business function runs; a decode failure answers
//! `400 Invalid request payload` and the function is never called.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::request::Request;
use crate::responder::Responder;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// and by the adapters [`with_input`] / [`with_decoder`]. The trait is
/// sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype wrapper bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Why a request body could not become the handler's input.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("fail to decode json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// The default decoder: the whole body as JSON.
pub fn json_body<T: DeserializeOwned>(req: &Request) -> Result<T, DecodeError> {
    Ok(serde_json::from_slice(req.body())?)
}

/// Wraps `handler(req, input)` so the input is decoded from the JSON body.
///
/// ```rust,no_run
/// use quire::{handler, Request, Responder, Router};
///
/// #[derive(serde::Deserialize)]
/// struct Rename { title: String }
///
/// async fn rename(_req: Request, input: Rename) -> Responder {
///     Responder::text(input.title)
/// }
///
/// let app = Router::new().put("/things/{id}", handler::with_input(rename));
/// ```
pub fn with_input<T, F, Fut, R>(handler: F) -> impl Handler
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(Request, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    with_decoder(json_body::<T>, handler)
}

/// Like [`with_input`], with a custom decode function (form bodies, query
/// strings, headers, ...).
pub fn with_decoder<T, D, F, Fut, R>(decode: D, handler: F) -> impl Handler
where
    T: Send + 'static,
    D: Fn(&Request) -> Result<T, DecodeError> + Send + Sync + 'static,
    F: Fn(Request, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    move |req: Request| -> BoxFuture {
        match decode(&req) {
            Ok(input) => {
                let fut = handler(req, input);
                Box::pin(async move { fut.await.into_response() })
            }
            Err(err) => {
                debug!(parent: req.span(), error = %err, "rejecting request payload");
                Box::pin(std::future::ready(invalid_payload()))
            }
        }
    }
}

fn invalid_payload() -> Response {
    Responder::text_error(StatusCode::BAD_REQUEST, "Invalid request payload").respond()
}
