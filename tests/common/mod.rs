#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use email_assistant::{config::AppConfig, db, router::build_router, AppState};

pub const API_KEY: &str = "test-integration-key";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    _dir: TempDir,
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        jwt_secret: JWT_SECRET.to_string(),
        integration_api_key: API_KEY.to_string(),
        environment: "development".to_string(),
        port: 0,
        frontend_url: "http://localhost:8080".to_string(),
        token_ttl_seconds: 3600,
        bcrypt_cost: 4,
        smtp: None,
    }
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let database_url = dir.path().join("test.db").to_string_lossy().into_owned();
        let pool = db::create_pool(&database_url).expect("pool");
        db::run_migrations(&pool).expect("migrations");
        let state = Arc::new(AppState::new(test_config(database_url), pool));
        Self {
            router: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn sync(&self, body: Value) -> (StatusCode, Value) {
        self.sync_with_key(Some(API_KEY), body).await
    }

    pub async fn sync_with_key(&self, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/integration/sync")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Registers a user and returns their access token.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .json("POST", "/api/register", None, json!({"email": email, "password": PASSWORD}))
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_agent(&self, token: &str, mailbox: &str) -> i64 {
        let (status, body) = self
            .json(
                "POST",
                "/api/agents",
                Some(token),
                json!({"name": "Inbox", "email": mailbox, "timezone": "Europe/Helsinki"}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create agent failed: {}", body);
        body["id"].as_i64().expect("agent id")
    }

    /// A user with one agent on `mailbox`; returns `(token, agent_id)`.
    pub async fn owner_with_agent(&self, mailbox: &str) -> (String, i64) {
        let token = self.register("owner@example.com").await;
        let agent_id = self.create_agent(&token, mailbox).await;
        (token, agent_id)
    }
}

pub fn email_item(gmail_id: &str, tier: i64) -> Value {
    json!({
        "gmailId": gmail_id,
        "threadId": format!("thread-{}", gmail_id),
        "from": "client@example.org",
        "subject": format!("Subject {}", gmail_id),
        "snippet": "Could we move the meeting?",
        "receivedAt": "2025-03-01T09:30:00Z",
        "tier": tier,
        "reasoning": "classified by test",
        "confidence": 0.9,
    })
}
