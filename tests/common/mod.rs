//! Shared fixtures for the integration tests: an in-memory database, mock
//! storage, and hand-built multipart bodies.
#![allow(dead_code)]

use axum::{
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use challenge_portal::{
    AppConfig, AppState, ChallengeRegistry, MockStorageService, SqliteRepository,
    repository::{self, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;

pub const BOUNDARY: &str = "portal-test-boundary";

pub const VALID_HOUSE_CSV: &[u8] = b"id,prediction\n1,100.5\n2,200.0\n";

/// TestContext
///
/// The assembled state plus a handle on the mock storage, so tests can inspect
/// or tamper with stored files.
pub struct TestContext {
    pub state: AppState,
    pub storage: MockStorageService,
}

pub async fn create_test_state() -> TestContext {
    create_test_state_with(AppConfig::default()).await
}

pub async fn create_test_state_with(config: AppConfig) -> TestContext {
    let pool = repository::connect("sqlite::memory:")
        .await
        .expect("in-memory database should open and migrate");
    let storage = MockStorageService::new();

    let state = AppState {
        repo: Arc::new(SqliteRepository::new(pool)) as RepositoryState,
        storage: Arc::new(storage.clone()) as StorageState,
        challenges: Arc::new(ChallengeRegistry::builtin()),
        config,
    };
    TestContext { state, storage }
}

/// Builds a multipart/form-data body with the given text fields and an
/// optional `file` part.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((filename, content)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(fields, file)))
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

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
