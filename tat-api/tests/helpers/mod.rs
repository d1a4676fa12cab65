//! Shared helpers for tat-api integration tests
//!
//! Fake Claude and Whisper servers run on loopback so the full request path
//! (router, services, HTTP clients) is exercised without real API keys.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tat_api::api::{AuthUser, TokenVerifier};
use tat_api::config::ServerConfig;
use uuid::Uuid;

/// Verifier backed by a fixed token table
#[derive(Default)]
pub struct StaticVerifier {
    users: HashMap<String, AuthUser>,
}

impl StaticVerifier {
    pub fn with_user(mut self, token: &str, id: Uuid) -> Self {
        self.users.insert(
            token.to_string(),
            AuthUser {
                id,
                email: Some(format!("{}@example.test", token)),
            },
        );
        self
    }
}

#[axum::async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Option<AuthUser> {
        self.users.get(token).cloned()
    }
}

/// Serve `router` on an ephemeral loopback port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind loopback");
    let addr = listener.local_addr().expect("Should have local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Fake server failed");
    });
    format!("http://{}", addr)
}

/// Messages API stand-in answering every prompt with `reply`
pub async fn fake_claude(reply: String) -> String {
    let router = Router::new().route(
        "/v1/messages",
        post(move || {
            let reply = reply.clone();
            async move {
                Json(json!({
                    "id": "msg_test",
                    "type": "message",
                    "content": [{"type": "text", "text": reply}]
                }))
            }
        }),
    );
    spawn_server(router).await
}

/// Messages API stand-in that always fails with `status`
pub async fn failing_claude(status: StatusCode) -> String {
    let router = Router::new().route(
        "/v1/messages",
        post(move || async move {
            (
                status,
                Json(json!({"error": {"type": "api_error", "message": "boom"}})),
            )
        }),
    );
    spawn_server(router).await
}

/// Messages API stand-in that rejects the first `failures` calls
///
/// Later calls answer with `reply`. Returns the base URL and the call counter.
pub async fn flaky_claude(reply: String, failures: usize) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        "/v1/messages",
        post(move || {
            let reply = reply.clone();
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < failures {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": {"type": "invalid_request_error", "message": "bad chunk"}})),
                    );
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "id": "msg_test",
                        "type": "message",
                        "content": [{"type": "text", "text": reply}]
                    })),
                )
            }
        }),
    );
    (spawn_server(router).await, calls)
}

/// Whisper stand-in returning a fixed `verbose_json` transcription
pub async fn fake_whisper() -> String {
    let router = Router::new().route(
        "/audio/transcriptions",
        post(|| async {
            Json(json!({
                "text": "Soy un desastre. Vamos, siguiente punto.",
                "language": "spanish",
                "duration": 4.5,
                "segments": [
                    {"id": 0, "start": 0.0, "end": 2.0, "text": "Soy un desastre."},
                    {"id": 1, "start": 2.0, "end": 4.5, "text": "Vamos, siguiente punto."}
                ],
                "words": [
                    {"word": "Soy", "start": 0.0, "end": 0.3}
                ]
            }))
        }),
    );
    spawn_server(router).await
}

/// Config with no integrations, uploads under `dir`
pub fn base_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        upload_dir: dir.join("uploads"),
        openai_max_retries: 1,
        claude_max_retries: 1,
        ..ServerConfig::default()
    }
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_json_request(method: &str, uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Multipart body with the given parts: (name, file name, content)
pub fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let boundary = "tat-test-boundary";
    let mut body = Vec::new();

    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
