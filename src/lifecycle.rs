//! Process lifecycle: startup, serving, coordinated shutdown.
//!
//! ```text
//! configuring -> connecting-store -> routing-ready -> serving -> shutting-down -> terminated
//! ```
//!
//! While serving, two tasks run side by side: the server's accept loop and
//! a signal watcher. Whichever finishes first triggers the shared
//! [`Shutdown`], which releases the other; both are joined before
//! [`run`] returns.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::api::{self, Policy, Services, Upstream};
use crate::config::Config;
use crate::error::Error;
use crate::router::App;
use crate::server::Server;
use crate::store::{PgPostStore, PostStore, postgres};

/// Coordinator for graceful shutdown.
///
/// Cloning shares the same flag. Triggering is idempotent, and waiters that
/// subscribe after the trigger resolve immediately.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // A closed channel means every `Shutdown` is gone and nobody can
            // trigger any more.
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the service described by `config` until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), Error> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        "starting"
    );

    let pool = postgres::connect(&config.database.url, &config.database.pool).await?;
    let store: Arc<dyn PostStore> = Arc::new(PgPostStore::new(pool.clone()));

    let client = api::upstream::client(config.upstream.timeout)?;
    let services = Services {
        posts: store,
        quotes: Upstream::new(client.clone(), &config.upstream.quote_url),
        users: Upstream::new(client, &config.upstream.users_url),
    };
    let policy = Policy {
        request_timeout: config.server.request_timeout(),
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    };
    let app = api::router(services, &policy).into_app();

    let server = match Server::bind(config.server.addr).await {
        Ok(server) => server
            .idle_timeout(config.server.idle_timeout)
            .read_timeout(config.server.read_timeout)
            .max_body_bytes(config.server.max_body_bytes)
            .shutdown_timeout(config.server.shutdown_timeout),
        Err(err) => {
            pool.close().await;
            return Err(err);
        }
    };

    let result = serve(server, app, Shutdown::new()).await;
    pool.close().await;
    info!("stopped");
    result
}

/// Serves `app` until an OS signal arrives, `shutdown` is triggered
/// elsewhere, or the server stops on its own.
pub async fn serve(server: Server, app: App, shutdown: Shutdown) -> Result<(), Error> {
    let serving = tokio::spawn(server.serve(app, shutdown.wait()));

    let watcher = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = tokio::select! {
                res = shutdown_signal() => match res {
                    Ok(signal) => {
                        info!(signal, "shutdown signal received");
                        Ok(())
                    }
                    Err(err) => {
                        error!("cannot listen for shutdown signals: {err}");
                        Err(Error::Io(err))
                    }
                },
                () = shutdown.wait() => Ok(()),
            };
            shutdown.trigger();
            result
        }
    });

    let served = serving.await;
    // Releases the watcher when the server stopped on its own.
    shutdown.trigger();
    let watched = watcher.await;

    served??;
    watched??;
    Ok(())
}

/// Resolves with the name of the first shutdown signal the process
/// receives: SIGTERM (orchestrators) or SIGINT (Ctrl-C).
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

/// Only Ctrl-C is available off Unix.
#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
