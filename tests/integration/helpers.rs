//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use agentbase_core::config::AppConfig;
use agentbase_core::config::plugin::PluginConfig;
use agentbase_plugin::{PluginPackage, Runtime};

/// User id sent with management requests.
pub const TEST_USER: &str = "user-1";

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// The runtime behind the router
    pub runtime: Arc<Runtime>,
}

impl TestApp {
    /// Create a test application with the bundled plugins published
    pub async fn new() -> Self {
        Self::with_packages(Vec::new()).await
    }

    /// Create a test application that also publishes `extra` packages
    pub async fn with_packages(extra: Vec<PluginPackage>) -> Self {
        let plugins = PluginConfig {
            // Nothing listens here, so plugin outbound calls fail fast.
            platform_base_url: "http://127.0.0.1:1".to_string(),
            callback_timeout_ms: 2_000,
            ..PluginConfig::default()
        };
        let config = AppConfig {
            plugins: plugins.clone(),
            ..AppConfig::default()
        };

        let runtime = Arc::new(Runtime::in_memory(plugins).expect("Failed to build runtime"));
        let packages = [plugin_hello_world::plugin(), plugin_sentiment::plugin()]
            .into_iter()
            .chain(extra);
        for package in packages {
            runtime
                .publish(package)
                .await
                .expect("Failed to publish package");
        }

        let router = agentbase_api::build_router(agentbase_api::AppState::new(
            config,
            Arc::clone(&runtime),
        ));

        Self { router, runtime }
    }

    /// Installs and activates `plugin` in `app_id` through the API
    pub async fn install_active(&self, app_id: &str, plugin: &str) {
        let response = self
            .request(
                "POST",
                &format!("/api/applications/{app_id}/plugins"),
                Some(serde_json::json!({ "plugin": plugin })),
                Some(TEST_USER),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        let response = self
            .request(
                "PUT",
                &format!("/api/applications/{app_id}/plugins/{plugin}/activate"),
                None,
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    }

    /// Make a JSON request, optionally as `user_id`
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        user_id: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        self.raw_request(method, path, body_str, user_id).await
    }

    /// Make a request with a raw body
    pub async fn raw_request(
        &self,
        method: &str,
        path: &str,
        body: String,
        user_id: Option<&str>,
    ) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(user_id) = user_id {
            req = req.header("x-user-id", user_id);
        }

        let req = req.body(Body::from(body)).expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}
