//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use quire::api::{self, Policy, Services, Upstream};
use quire::store::{CreatePost, MemoryPostStore, Post, PostStore, StoreError, UpdatePost};
use quire::{App, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uuid::Uuid;

/// Starts a mock upstream on an ephemeral port that answers every request
/// with `status` and `body`, then closes the connection.
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let reason = http::StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("Unknown");
                        let response = format!(
                            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len(),
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// The full router over `store`, with upstreams at `quote_url` and
/// `users_url`.
pub fn app_with(store: Arc<dyn PostStore>, quote_url: &str, users_url: &str) -> App {
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build().unwrap();
    let services = Services {
        posts: store,
        quotes: Upstream::new(client.clone(), quote_url),
        users: Upstream::new(client, users_url),
    };
    let policy = Policy { request_timeout: Duration::from_secs(5), cors_allowed_origins: vec!["*".to_owned()] };
    api::router(services, &policy).into_app()
}

/// The full router over an empty in-memory store. Upstreams point at a
/// closed port.
pub fn app() -> App {
    memory_app(Arc::new(MemoryPostStore::new()))
}

pub fn memory_app(store: Arc<dyn PostStore>) -> App {
    app_with(store, "http://127.0.0.1:9/quotes", "http://127.0.0.1:9/users")
}

pub fn request(method: &str, uri: &str, body: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Bytes::copy_from_slice(body.as_bytes()))
        .unwrap()
}

pub fn get(uri: &str) -> http::Request<Bytes> {
    request("GET", uri, "")
}

pub fn body_json(res: &Response) -> serde_json::Value {
    serde_json::from_slice(res.body()).unwrap()
}

pub fn body_text(res: &Response) -> &str {
    std::str::from_utf8(res.body()).unwrap()
}

/// A store whose every operation fails like a lost database connection.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl PostStore for FailingStore {
    async fn create_post(&self, _params: CreatePost) -> Result<Post, StoreError> {
        Err(unavailable())
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        Err(unavailable())
    }

    async fn get_post(&self, _id: Uuid) -> Result<Post, StoreError> {
        Err(unavailable())
    }

    async fn update_post(&self, _params: UpdatePost) -> Result<Post, StoreError> {
        Err(unavailable())
    }

    async fn delete_post(&self, _id: Uuid) -> Result<u64, StoreError> {
        Err(unavailable())
    }
}
