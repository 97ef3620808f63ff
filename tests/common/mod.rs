use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use parley::server::{router, AppState};
use parley::storage::FileStore;
use parley::test_utils::FakeEndpoint;
use parley::Config;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

#[allow(dead_code)]
pub fn create_temp_store() -> (FileStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store =
        FileStore::new_with_path(tmp.path().join("store.json")).expect("failed to create store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn test_state(endpoint: Arc<FakeEndpoint>) -> AppState {
    AppState::new(&Config::default(), endpoint).expect("failed to build state")
}

#[allow(dead_code)]
pub fn test_router(endpoint: Arc<FakeEndpoint>) -> Router {
    router(test_state(endpoint))
}

/// Send a request and return the status, the `Set-Cookie` pair and the JSON body
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, Option<String>, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");
    split(response).await
}

async fn split(response: Response<Body>) -> (StatusCode, Option<String>, serde_json::Value) {
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    };
    (status, cookie, body)
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: &serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}
