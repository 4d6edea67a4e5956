//! Shared helpers for the integration tests: an in-memory app and a small
//! request driver over `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use publishing_service::db::{MemoryStore, Store};
use publishing_service::security::TokenService;
use publishing_service::{build_router, AppState};

pub const TEST_SECRET: &[u8] = b"integration-test-secret-value";

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub tokens: TokenService,
}

impl TestApp {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let tokens = TokenService::new(TEST_SECRET, Duration::hours(24));
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let router = build_router(AppState::new(shared, tokens.clone()));
        Self {
            router,
            store,
            tokens,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Register and log in; returns `(user_id, token)`.
    pub async fn signup(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": "secret123",
                    "email": format!("{}@example.com", username),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let (status, body) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": "secret123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        (
            body["user"]["id"].as_str().expect("user id").to_string(),
            body["token"].as_str().expect("token").to_string(),
        )
    }

    pub async fn create_post(&self, token: &str, title: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": title, "content": "Body text" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {}", body);
        body["id"].as_str().expect("post id").to_string()
    }

    pub async fn create_comment(&self, token: &str, post_id: &str, content: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/posts/{}/comments", post_id),
                Some(token),
                Some(json!({ "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create comment failed: {}", body);
        body["id"].as_str().expect("comment id").to_string()
    }

    pub async fn comment_status(&self, post_id: &str) -> String {
        let (status, body) = self
            .send(Method::GET, &format!("/posts/{}", post_id), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["comment_status"].as_str().expect("status").to_string()
    }

    pub async fn post_count(&self, token: &str) -> i64 {
        let (status, body) = self
            .send(Method::GET, "/auth/profile", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["post_count"].as_i64().expect("post_count")
    }
}
