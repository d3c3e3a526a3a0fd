//! Environment-derived process configuration.
//!
//! Everything is read once at startup by [`Config::from_env`]. Missing or
//! malformed required values are fatal: the process never starts serving
//! with a half-valid configuration.
//!
//! Durations use Go's syntax (`300ms`, `1m30s`, `1.5h`) so existing
//! deployment manifests keep working.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::store::postgres::PoolOptions;

pub const DEFAULT_QUOTE_API_URL: &str = "https://dummyjson.com/quotes/random";
pub const DEFAULT_USERS_API_URL: &str = "https://jsonplaceholder.typicode.com/users";

const DEFAULT_IDLE_CONN_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: Level,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: PoolOptions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// How long a kept-alive connection may sit without sending a new
    /// request head.
    pub idle_timeout: Duration,
    /// Grace period for in-flight connections once shutdown starts.
    pub shutdown_timeout: Duration,
    /// Largest request body the server buffers.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Upper bound on the time one request may spend in the handler chain.
    pub fn request_timeout(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub quote_url: String,
    pub users_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let log_level = env.required("LOG_LEVEL", |raw| {
            Level::from_str(raw).map_err(|_| "expected one of trace, debug, info, warn, error".to_owned())
        })?;

        let max_connections = env.required("DATABASE_MAX_CONNS", parse_pool_size)?;
        let min_connections = env.optional("DATABASE_MIN_CONNS", parse_pool_size)?.unwrap_or(max_connections);
        if min_connections > max_connections {
            return Err(ConfigError::Invalid {
                var: "DATABASE_MIN_CONNS",
                reason: format!("{min_connections} exceeds DATABASE_MAX_CONNS ({max_connections})"),
            });
        }
        let database = DatabaseConfig {
            url: env.required("DATABASE_URL", |raw| Ok(raw.to_owned()))?,
            pool: PoolOptions {
                min_connections,
                max_connections,
                idle_timeout: env
                    .optional("DATABASE_IDLE_TIMEOUT", parse_duration)?
                    .unwrap_or(DEFAULT_IDLE_CONN_TIMEOUT),
            },
        };

        let server = ServerConfig {
            addr: env.required("SERVER_ADDR", parse_addr)?,
            read_timeout: env.required("SERVER_READ_TIMEOUT", parse_duration)?,
            write_timeout: env.required("SERVER_WRITE_TIMEOUT", parse_duration)?,
            idle_timeout: env.required("SERVER_IDLE_TIMEOUT", parse_duration)?,
            shutdown_timeout: env
                .optional("SERVER_SHUTDOWN_TIMEOUT", parse_duration)?
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            max_body_bytes: env
                .optional("SERVER_MAX_BODY_BYTES", parse_body_limit)?
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        };

        let upstream = UpstreamConfig {
            quote_url: env
                .optional("QUOTE_API_URL", |raw| Ok(raw.to_owned()))?
                .unwrap_or_else(|| DEFAULT_QUOTE_API_URL.to_owned()),
            users_url: env
                .optional("USERS_API_URL", |raw| Ok(raw.to_owned()))?
                .unwrap_or_else(|| DEFAULT_USERS_API_URL.to_owned()),
            timeout: env
                .optional("UPSTREAM_TIMEOUT", parse_duration)?
                .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
        };

        let cors_allowed_origins = env
            .optional("CORS_ALLOWED_ORIGINS", |raw| Ok(parse_list(raw)))?
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_owned()]);

        Ok(Self { log_level, database, server, upstream, cors_allowed_origins })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
    }

    fn optional<T>(
        &self,
        var: &'static str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> Result<Option<T>, ConfigError> {
        self.raw(var)
            .map(|raw| parse(&raw).map_err(|reason| ConfigError::Invalid { var, reason }))
            .transpose()
    }

    fn required<T>(&self, var: &'static str, parse: impl FnOnce(&str) -> Result<T, String>) -> Result<T, ConfigError> {
        self.optional(var, parse)?.ok_or(ConfigError::Missing(var))
    }
}

fn parse_pool_size(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(0) => Err("must be at least 1".to_owned()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_body_limit(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_owned()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

/// Accepts `host:port`, `ip:port`, or a bare `:port` meaning every
/// interface.
pub fn parse_addr(raw: &str) -> Result<SocketAddr, String> {
    if let Some(port) = raw.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| format!("invalid port in {raw:?}"))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    if let Ok(addr) = raw.parse() {
        return Ok(addr);
    }
    raw.to_socket_addrs()
        .map_err(|err| format!("{raw:?}: {err}"))?
        .next()
        .ok_or_else(|| format!("{raw:?} resolved to no addresses"))
}

/// Parses a Go-style duration: a sequence of decimal numbers each followed
/// by a unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare `0` is allowed.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    if raw.is_empty() {
        return Err("empty duration".to_owned());
    }
    if raw.starts_with('-') {
        return Err(format!("negative duration {raw:?}"));
    }

    let mut rest = raw.strip_prefix('+').unwrap_or(raw);
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() {
            return Err(format!("invalid duration {raw:?}"));
        }
        let value: f64 = number.parse().map_err(|_| format!("invalid duration {raw:?}"))?;

        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration {raw:?}")),
            other => return Err(format!("unknown unit {other:?} in duration {raw:?}")),
        };

        nanos += value * scale;
        rest = tail;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("duration {raw:?} out of range"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}
