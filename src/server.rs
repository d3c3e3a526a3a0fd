//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! When the shutdown future passed to [`Server::serve`] resolves, the server:
//! 1. Stops calling `listener.accept()` and closes the listener, so no new
//!    connections are made.
//! 2. Asks every open connection to finish gracefully: in-flight requests
//!    complete, idle keep-alive connections close, HTTP/2 sends `GOAWAY`.
//! 3. Waits for the connections to drain, for at most the shutdown grace
//!    period measured from the moment shutdown started.
//!
//! Connections still open after the grace period are aborted and `serve`
//! returns [`Error::ShutdownTimeout`].
//!
//! Orchestrators usually send SIGTERM and wait a fixed period (Kubernetes:
//! `terminationGracePeriodSeconds`, default 30 s) before SIGKILL. Keep the
//! grace period below that.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Span, debug, error, info, info_span, warn};

use crate::error::Error;
use crate::request::Request;
use crate::responder::Responder;
use crate::router::App;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Pause after a failed `accept`, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    idle_timeout: Option<Duration>,
    shutdown_timeout: Duration,
    body: BodyLimits,
}

/// How much of a request body the server buffers, and for how long.
#[derive(Clone, Copy, Debug)]
struct BodyLimits {
    read_timeout: Option<Duration>,
    max_bytes: usize,
}

impl Server {
    /// Binds `addr`. Fails if the address is in use or not ours to take.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), quire::Error> {
    /// let server = quire::Server::bind("0.0.0.0:3000".parse().unwrap()).await?;
    /// # Ok(()) }
    /// ```
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        Ok(Self::from_listener(TcpListener::bind(addr).await?))
    }

    /// Serves on an already-bound listener, such as one bound to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            listener,
            idle_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            body: BodyLimits { read_timeout: None, max_bytes: DEFAULT_MAX_BODY_BYTES },
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// How long an HTTP/1 connection may take to send the next request head.
    /// Unset means no limit.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// How long a request body may take to arrive once its head has been
    /// read. Expiry answers `408`. Unset means no limit.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.body.read_timeout = Some(timeout);
        self
    }

    /// Largest request body buffered before dispatch. Larger bodies are
    /// answered with `413`. Defaults to 2 MiB.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.body.max_bytes = limit;
        self
    }

    /// Grace period for in-flight connections once shutdown starts.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Accepts connections and dispatches them through `app` until
    /// `shutdown` resolves, then drains.
    pub async fn serve<F>(self, app: App, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send,
    {
        let Self { listener, idle_timeout, shutdown_timeout, body } = self;
        let addr = listener.local_addr()?;

        // Shared across concurrent connection tasks without copying the
        // routing table.
        let app = Arc::new(app);

        // Flipped to `true` once; every connection task holds a receiver.
        let (drain_tx, drain_rx) = watch::channel(false);

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = JoinSet::new();

        info!(%addr, "listening");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so it stops accepting immediately,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutting down, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let drain = drain_rx.clone();
                    tasks.spawn(serve_connection(app, TokioIo::new(stream), peer, idle_timeout, body, drain));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        drain_tx.send_replace(true);

        if tokio::time::timeout(shutdown_timeout, drain(&mut tasks)).await.is_err() {
            warn!(
                remaining = tasks.len(),
                grace = ?shutdown_timeout,
                "grace period elapsed, aborting remaining connections"
            );
            tasks.shutdown().await;
            return Err(Error::ShutdownTimeout(shutdown_timeout));
        }

        info!("server stopped");
        Ok(())
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(res) = tasks.join_next().await {
        if let Err(err) = res {
            error!("connection task failed: {err}");
        }
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

async fn serve_connection(
    app: Arc<App>,
    io: TokioIo<tokio::net::TcpStream>,
    peer: SocketAddr,
    idle_timeout: Option<Duration>,
    limits: BodyLimits,
    mut drain: watch::Receiver<bool>,
) {
    // Boundary span: the default logger of every request on this connection
    // until the access log narrows it.
    let span = info_span!("conn", %peer);

    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let app = Arc::clone(&app);
        let span = span.clone();
        async move { Ok::<_, Infallible>(dispatch(&app, req, limits, span).await) }
    });

    // `auto::Builder` transparently handles both HTTP/1.1 and HTTP/2,
    // whatever the client negotiates.
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    if let Some(timeout) = idle_timeout {
        builder.http1().timer(TokioTimer::new()).header_read_timeout(timeout);
    }

    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let mut draining = false;
    let res = loop {
        tokio::select! {
            res = conn.as_mut() => break res,
            Ok(()) = drain.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    };
    if let Err(e) = res {
        debug!(%peer, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, then hands the request to the app. Every failure is
/// turned into a response so hyper never sees an error.
async fn dispatch(
    app: &App,
    req: hyper::Request<Incoming>,
    limits: BodyLimits,
    span: Span,
) -> http::Response<Full<Bytes>> {
    let (head, body) = req.into_parts();
    match read_body(body, limits).await {
        Ok(body) => app.call(Request::new(head, body, span)).await.into_inner(),
        Err(rejection) => rejection.with_logger(span).respond().into_inner(),
    }
}

async fn read_body(body: Incoming, limits: BodyLimits) -> Result<Bytes, Responder> {
    let collect = Limited::new(body, limits.max_bytes).collect();
    let collected = match limits.read_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, collect).await {
            Ok(collected) => collected,
            Err(elapsed) => {
                return Err(Responder::text_error(StatusCode::REQUEST_TIMEOUT, "Request Timeout").caused_by(elapsed));
            }
        },
        None => collect.await,
    };

    match collected {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => {
            Err(Responder::text_error(StatusCode::PAYLOAD_TOO_LARGE, "Request Entity Too Large").caused_by(err))
        }
        Err(err) => Err(Responder::text_error(StatusCode::BAD_REQUEST, "Bad Request").caused_by(err)),
    }
}
