//! Panic recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::responder::Responder;

/// Catches a panic anywhere downstream and answers
/// `500 {"error":"Internal Server Error"}`. The connection and the process
/// keep running.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recover;

impl Middleware for Recover {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let span = req.span().clone();
        Box::pin(async move {
            // The whole downstream call, synchronous prelude included, runs
            // inside the guarded future.
            let guarded = AssertUnwindSafe(async move { next.run(req).await });
            match guarded.catch_unwind().await {
                Ok(res) => res,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(parent: &span, panic = %message, "recovered from panic in handler");
                    Responder::internal_server_error(format!("panic: {message}")).respond()
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::handler::Handler;

    #[tokio::test]
    async fn panic_becomes_internal_server_error() {
        let endpoint = (|_req: Request| async move {
            if true {
                panic!("boom");
            }
            Responder::empty()
        })
        .into_boxed_handler();
        let chain: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(Recover) as Arc<dyn Middleware>]);

        let res = Next::new(chain, endpoint)
            .run(Request::from_http(http::Request::new(Bytes::new())))
            .await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), br#"{"error":"Internal Server Error"}"#);
    }

    #[test]
    fn reads_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
    }
}
