#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bandhub_api::{AppState, AppStateInner};
use bandhub_db::Database;

pub const SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: SECRET.into(),
            token_ttl: chrono::Duration::hours(1),
        });
        let router = bandhub_api::router(state.clone());
        Self { state, router }
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
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers a user and returns `(user_id, token)`.
    pub async fn register(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "username": username, "password": "long-enough-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Creates an organization and returns `(organization_id, token)`, the
    /// token being scoped to the new organization.
    pub async fn create_organization(&self, token: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .send(Method::POST, "/organizations", Some(token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["organization"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn add_member(&self, admin_token: &str, org_id: &str, username: &str, role: &str) {
        let (status, body) = self
            .send(
                Method::POST,
                &format!("/organizations/{}/members", org_id),
                Some(admin_token),
                Some(json!({ "username": username, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    /// Switches context and returns the new token.
    pub async fn switch(&self, token: &str, org_id: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/switch-organization",
            Some(token),
            Some(json!({ "organization_id": org_id })),
        )
        .await
    }
}
