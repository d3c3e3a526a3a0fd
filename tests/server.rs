mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quire::lifecycle::{self, Shutdown};
use quire::{App, Error, Request, Responder, Router, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

type Serving = tokio::task::JoinHandle<Result<(), Error>>;

async fn listen() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    Server::from_listener(listener).idle_timeout(Duration::from_secs(5))
}

fn spawn(server: Server, app: App) -> (SocketAddr, Shutdown, Serving) {
    let addr = server.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(lifecycle::serve(server, app, shutdown.clone()));
    (addr, shutdown, handle)
}

async fn start(app: App, grace: Duration) -> (String, Shutdown, Serving) {
    let (addr, shutdown, handle) = spawn(listen().await.shutdown_timeout(grace), app);
    (format!("http://{addr}"), shutdown, handle)
}

/// Writes `raw` on a fresh connection and returns the status line of the
/// answer.
async fn status_line(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    while !buf.windows(2).any(|w| w == b"\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&buf);
    text.lines().next().unwrap_or_default().to_owned()
}

/// A router whose `/slow` handler signals `entered`, then sleeps for `delay`.
fn slow_app(entered: Arc<Notify>, delay: Duration) -> App {
    Router::new()
        .get("/slow", move |_req: Request| {
            let entered = Arc::clone(&entered);
            async move {
                entered.notify_one();
                tokio::time::sleep(delay).await;
                Responder::text("done")
            }
        })
        .into_app()
}

#[tokio::test]
async fn serves_and_shuts_down_cleanly() {
    let (base, shutdown, handle) = start(common::app(), Duration::from_secs(5)).await;

    let res = reqwest::get(format!("{base}/ping")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "pong");

    let res = reqwest::get(format!("{base}/api/v1/posts")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "[]");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn in_flight_request_finishes_during_drain() {
    let entered = Arc::new(Notify::new());
    let (base, shutdown, handle) = start(slow_app(Arc::clone(&entered), Duration::from_millis(300)), Duration::from_secs(5)).await;

    let pending = tokio::spawn(reqwest::get(format!("{base}/slow")));
    entered.notified().await;
    shutdown.trigger();

    let res = pending.await.unwrap().unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "done");

    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn drain_past_grace_period_is_an_error() {
    let entered = Arc::new(Notify::new());
    let (base, shutdown, handle) = start(slow_app(Arc::clone(&entered), Duration::from_secs(30)), Duration::from_millis(100)).await;

    let _pending = tokio::spawn(reqwest::get(format!("{base}/slow")));
    entered.notified().await;
    shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::ShutdownTimeout(grace)) if grace == Duration::from_millis(100)));
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let (base, shutdown, handle) = start(common::app(), Duration::from_secs(5)).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

    assert!(reqwest::get(format!("{base}/ping")).await.is_err());
}

#[tokio::test]
async fn stalled_body_is_answered_with_408() {
    // The request budget is 5 s; the body read gives up long before that.
    let server = listen().await.read_timeout(Duration::from_millis(200));
    let (addr, shutdown, handle) = spawn(server, common::app());

    let partial = b"POST /api/v1/posts HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: 100\r\nconnection: close\r\n\r\n{\"ti";
    let line = tokio::time::timeout(Duration::from_secs(2), status_line(addr, partial)).await.unwrap();
    assert!(line.starts_with("HTTP/1.1 408"), "{line}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn oversized_body_is_answered_with_413() {
    let server = listen().await.max_body_bytes(16);
    let (addr, shutdown, handle) = spawn(server, common::app());

    let body = format!(r#"{{"title":"{}"}}"#, "x".repeat(64));
    let raw = format!(
        "POST /api/v1/posts HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let line = tokio::time::timeout(Duration::from_secs(2), status_line(addr, raw.as_bytes())).await.unwrap();
    assert!(line.starts_with("HTTP/1.1 413"), "{line}");

    // Bodies within the limit still get through.
    let res = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/posts"))
        .body(r#"{"title":"a"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
}
