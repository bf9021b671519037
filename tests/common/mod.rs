#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::TempDir;
use tenancy::{
    api::{build_router, AppState},
    auth::{LocalSignedProvider, SharedAuthProvider},
    config::{AppConfig, DatabaseConfig},
    storage::{create_pool, DbPool},
};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub state: AppState,
    pub pool: DbPool,
    pub tokens: LocalSignedProvider,
    _dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn token(&self, subject: &str, email: &str) -> String {
        self.tokens.issue_token(subject, Some(email), Some("Test User")).expect("issue token")
    }
}

async fn test_pool() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let database = DatabaseConfig {
        url: format!("sqlite://{}/tenancy.db", dir.path().display()),
        max_connections: 5,
        min_connections: 1,
        ..DatabaseConfig::default()
    };
    let pool = create_pool(&database).await.expect("create sqlite pool");
    (pool, dir)
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(AppConfig::default()).await
}

pub async fn setup_test_app_with(config: AppConfig) -> TestApp {
    let (pool, dir) = test_pool().await;
    let tokens = LocalSignedProvider::new(TEST_SECRET.as_bytes(), Duration::from_secs(3600));
    let auth: SharedAuthProvider =
        Arc::new(LocalSignedProvider::new(TEST_SECRET.as_bytes(), Duration::from_secs(3600)));
    let state = AppState::with_provider(&config, pool.clone(), auth);

    TestApp { state, pool, tokens, _dir: dir }
}

/// App wired to an arbitrary provider; token issuing still uses the local secret.
pub async fn setup_test_app_with_provider(auth: SharedAuthProvider) -> TestApp {
    let (pool, dir) = test_pool().await;
    let tokens = LocalSignedProvider::new(TEST_SECRET.as_bytes(), Duration::from_secs(3600));
    let state = AppState::with_provider(&AppConfig::default(), pool.clone(), auth);

    TestApp { state, pool, tokens, _dir: dir }
}

pub async fn send_request(
    app: &TestApp,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let request = if let Some(json) = body {
        let bytes = serde_json::to_vec(&json).expect("serialize body");
        builder
            .header("content-type", "application/json")
            .body(Body::from(bytes))
            .expect("build request")
    } else {
        builder.body(Body::empty()).expect("build request")
    };

    app.router().oneshot(request).await.expect("request")
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    read_json(response).await
}

pub async fn count_organizations(app: &TestApp, token: &str) -> usize {
    let response = send_request(app, Method::GET, "/organization", Some(token), None).await;
    let orgs = expect_json(response, StatusCode::OK).await;
    orgs.as_array().expect("organization list").len()
}
