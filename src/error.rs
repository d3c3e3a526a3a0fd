//! Unified error type.

use std::time::Duration;

use crate::config::ConfigError;
use crate::store::StoreError;

/// The error type returned by quire's fallible process-level operations.
///
/// Request-level failures (404, 500, etc.) are expressed as
/// [`Responder`](crate::Responder) values, never as `Error`s. This type
/// surfaces what stops the process: bad configuration, an unreachable store,
/// a listener that cannot bind, or a drain that overran its grace period.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("logging: {0}")]
    Logging(String),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server task: {0}")]
    Join(#[from] tokio::task::JoinError),
}
