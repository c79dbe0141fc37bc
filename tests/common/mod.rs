//! Shared setup for the HTTP integration tests: an in-memory database with
//! migrations applied, the full router, and small request helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use taskboard::config::Config;
use taskboard::db::{User, UserRepository};
use taskboard::services::init;
use taskboard::{build_router, routes, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub struct TestContext {
    pub state: Arc<AppState>,
    pub app: Router,
}

/// A registered account and its bearer token.
pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database.url = "sqlite::memory:".to_string();
    // One connection, otherwise every connection sees its own empty database.
    config.database.max_connections = 1;
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config.auth.bcrypt_cost = 4;
    config
}

impl TestContext {
    pub async fn new() -> Self {
        let config = test_config();
        let db = init::init_db(&config).await.unwrap();
        let state = Arc::new(AppState::new(db, config));
        // No rate limiter: oneshot requests carry no peer address.
        let app = build_router(state.clone(), routes::auth::router());
        TestContext { state, app }
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
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn register(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["id"].as_str().unwrap().to_string(),
            name: body["name"].as_str().unwrap().to_string(),
            email: body["email"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Create a task through the API and return its id.
    pub async fn create_task(&self, owner: &TestUser, title: &str) -> String {
        let (status, body) = self
            .post("/api/tasks", &owner.token, json!({ "title": title }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn share_by_email(&self, owner: &TestUser, task_id: &str, emails: Value) -> (StatusCode, Value) {
        self.put(
            &format!("/api/tasks/{}/share", task_id),
            &owner.token,
            json!({ "emails": emails }),
        )
        .await
    }

    pub async fn notifications(&self, user: &TestUser) -> Vec<Value> {
        let (status, body) = self.get("/api/notifications", &user.token).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().cloned().unwrap_or_default()
    }

    pub async fn load_user(&self, user: &TestUser) -> User {
        UserRepository::find_by_id(&self.state.db, &user.id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// Notifications of one type, e.g. `"taskShared"`.
pub fn of_type<'a>(notifications: &'a [Value], kind: &str) -> Vec<&'a Value> {
    notifications
        .iter()
        .filter(|n| n["type"] == kind)
        .collect()
}
