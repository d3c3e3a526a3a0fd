mod common;

use std::sync::Arc;

use http::StatusCode;
use quire::store::MemoryPostStore;
use serde_json::json;

use common::{app_with, body_json, get, start_mock_backend};

const QUOTE: &str = r#"{
    "id": 1,
    "quote": "Life is what happens when you're busy making other plans",
    "author": "John Lennon"
}"#;

const USERS: &str = r#"[{
    "id": 1,
    "name": "Leanne Graham",
    "username": "Bret",
    "email": "Sincere@april.biz",
    "address": {"street": "Kulas Light", "suite": "Apt. 556", "city": "Gwenborough", "zipcode": "92998-3874"},
    "phone": "1-770-736-8031 x56442",
    "website": "hildegard.org"
}]"#;

async fn quotes_from(status: u16, body: &'static str) -> quire::Response {
    let addr = start_mock_backend(status, body).await;
    let app = app_with(Arc::new(MemoryPostStore::new()), &format!("http://{addr}/quotes/random"), "http://127.0.0.1:9/");
    app.oneshot(get("/api/v1/quotes")).await
}

async fn users_from(status: u16, body: &'static str) -> quire::Response {
    let addr = start_mock_backend(status, body).await;
    let app = app_with(Arc::new(MemoryPostStore::new()), "http://127.0.0.1:9/", &format!("http://{addr}/users"));
    app.oneshot(get("/api/v1/users")).await
}

#[tokio::test]
async fn quote_is_proxied() {
    let res = quotes_from(200, QUOTE).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(
        std::str::from_utf8(res.body()).unwrap(),
        r#"{"id":1,"quote":"Life is what happens when you're busy making other plans","author":"John Lennon"}"#
    );
}

#[tokio::test]
async fn upstream_error_status_is_forwarded_without_its_body() {
    let res = quotes_from(500, r#"{"error": "origin server error"}"#).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&res), json!({"error": "failed to fetch data from external API"}));

    let res = users_from(404, "missing").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(&res), json!({"error": "failed to fetch data from external API"}));
}

#[tokio::test]
async fn non_json_upstream_body_is_a_decode_failure() {
    let res = quotes_from(200, "invalid json").await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&res), json!({"error": "failed to decode response"}));
}

#[tokio::test]
async fn users_are_proxied() {
    let res = users_from(200, USERS).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let users = body_json(&res);
    assert_eq!(users[0]["username"], "Bret");
    assert_eq!(users[0]["address"]["city"], "Gwenborough");
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = app_with(Arc::new(MemoryPostStore::new()), &format!("http://{addr}/"), "http://127.0.0.1:9/");
    let res = app.oneshot(get("/api/v1/quotes")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&res), json!({"error": "failed to make request"}));
}

#[tokio::test]
async fn invalid_endpoint_fails_before_sending() {
    let app = app_with(Arc::new(MemoryPostStore::new()), "not a url", "http://127.0.0.1:9/");
    let res = app.oneshot(get("/api/v1/quotes")).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&res), json!({"error": "failed to create request"}));
}
