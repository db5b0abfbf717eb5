#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every test builds its own router over a fresh in-memory store, using the
//! real catalog, token registry, middleware and handlers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use campus_kernel::entity::Catalog;
use campus_kernel::models::TokenRegistry;
use campus_kernel::store::MemoryStore;
use campus_kernel::{AppState, Config, build_router};
use campus_test_utils::{ADMIN_TOKEN, TestToken, test_token, token_file};

/// Read-only access to students.
pub const READER_TOKEN: &str = "reader-token";

/// Create, read and update students, but not delete.
pub const CLERK_TOKEN: &str = "clerk-token";

/// Test application wrapper using the real kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub fn fixture_tokens() -> Vec<TestToken> {
    vec![
        test_token("reader", READER_TOKEN, &["read students"]),
        test_token(
            "clerk",
            CLERK_TOKEN,
            &["create students", "read students", "update students"],
        ),
    ]
}

impl TestApp {
    /// App over the built-in catalog with the fixture tokens.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, &fixture_tokens())
    }

    /// App with a custom token file in place of the fixture tokens.
    pub fn with_tokens(tokens: &[TestToken]) -> Self {
        Self::build(Config::default(), tokens)
    }

    fn build(config: Config, tokens: &[TestToken]) -> Self {
        let tokens = TokenRegistry::from_toml(&token_file(tokens))
            .expect("fixture token file")
            .with_admin_token(ADMIN_TOKEN)
            .expect("admin token");
        let state = AppState::from_parts(
            &config,
            Catalog::builtin().expect("built-in catalog"),
            Arc::new(MemoryStore::new()),
            tokens,
        );
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Send a request and return status and JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };
        (status, json)
    }

    /// Send a raw request and return the response untouched.
    pub async fn raw(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(ADMIN_TOKEN), None).await
    }

    /// Create an instance as admin and return its id.
    pub async fn create(&self, entity: &str, body: Value) -> Uuid {
        let (status, json) = self
            .request(
                Method::POST,
                &format!("/api/{entity}"),
                Some(ADMIN_TOKEN),
                Some(body),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {json}");
        Uuid::parse_str(json["id"].as_str().unwrap()).unwrap()
    }
}
