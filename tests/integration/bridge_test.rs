//! Integration tests for the plugin route bridge (`/plugin-api/*`).

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use agentbase_plugin_sdk::prelude::*;

use helpers::{TEST_USER, TestApp};

const APP: &str = "app-1";

/// A plugin whose routes exercise each response mapping.
fn echo_plugin() -> PluginPackage {
    create_plugin("echo", "1.0.0")
        .description("Echoes bridged requests")
        .route(
            "/echo",
            handler_fn(|_ctx, args| async move {
                let request = args.into_iter().next().unwrap_or(Value::Null);
                Ok(respond(201, json!({ "received": request })))
            }),
        )
        .route("/empty", handler_fn(|_ctx, _args| async move { Ok(Value::Null) }))
        .route(
            "/boom",
            handler_fn(|_ctx, _args| async move {
                Err(CallbackError::failed("secret internal detail"))
            }),
        )
        .route(
            "/slow",
            handler_fn(|_ctx, _args| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!("late"))
            }),
        )
        .filter(
            points::API_ROUTES,
            filter_fn(|_ctx, routes, _args| async move {
                let mut routes = match routes {
                    Value::Array(routes) => routes,
                    _ => Vec::new(),
                };
                routes.push(route_descriptor("POST", "/echo", "Echo the request", "echo"));
                Ok(Value::Array(routes))
            }),
        )
        .build()
}

async fn echo_app() -> TestApp {
    let app = TestApp::with_packages(vec![echo_plugin()]).await;
    app.install_active(APP, "echo").await;
    app
}

#[tokio::test]
async fn test_request_is_forwarded_to_handler() {
    let app = echo_app().await;

    let response = app
        .request(
            "POST",
            "/api/applications/app-1/plugin-api/echo?lang=en",
            Some(json!({ "text": "hi" })),
            Some(TEST_USER),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let received = &response.body["received"];
    assert_eq!(received["method"], "POST");
    assert_eq!(received["path"], "/echo");
    assert_eq!(received["query"]["lang"], "en");
    assert_eq!(received["headers"]["x-user-id"], TEST_USER);
    assert_eq!(received["body"], json!({ "text": "hi" }));
}

#[tokio::test]
async fn test_trailing_slash_matches_route() {
    let app = echo_app().await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-api/echo/", None, None)
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["received"]["body"], Value::Null);
}

#[tokio::test]
async fn test_null_result_is_no_content() {
    let app = echo_app().await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-api/empty", None, None)
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unclaimed_route_is_not_found() {
    let app = echo_app().await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-api/missing", None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");

    // Routes are scoped to the application that activated the plugin.
    let response = app
        .request("POST", "/api/applications/app-2/plugin-api/echo", None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_handler_failure_is_hidden() {
    let app = echo_app().await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-api/boom", None, None)
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"], "PLUGIN_ERROR");
    assert!(!response.body.to_string().contains("secret internal detail"));
}

#[tokio::test(start_paused = true)]
async fn test_handler_timeout_is_gateway_timeout() {
    let app = echo_app().await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-api/slow", None, None)
        .await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.body["error"], "PLUGIN_TIMEOUT");
}

#[tokio::test]
async fn test_invalid_json_body_is_rejected() {
    let app = echo_app().await;

    let response = app
        .raw_request(
            "POST",
            "/api/applications/app-1/plugin-api/echo",
            "{not json".to_string(),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_deactivated_plugin_stops_serving() {
    let app = echo_app().await;

    let response = app
        .request("PUT", "/api/applications/app-1/plugins/echo/deactivate", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .request("POST", "/api/applications/app-1/plugin-api/echo", None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_plugin_routes_are_listed() {
    let app = echo_app().await;
    app.install_active(APP, "custom-api-sentiment").await;

    let response = app
        .request("GET", "/api/applications/app-1/plugin-routes", None, None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let mut paths: Vec<(String, String)> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["plugin"].as_str().unwrap().to_string(),
                r["path"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            ("custom-api-sentiment".to_string(), "/sentiment/analyze".to_string()),
            ("custom-api-sentiment".to_string(), "/sentiment/health".to_string()),
            ("echo".to_string(), "/echo".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_sentiment_endpoints() {
    let app = TestApp::new().await;
    app.install_active(APP, "custom-api-sentiment").await;

    let response = app
        .request(
            "GET",
            "/api/applications/app-1/plugin-api/sentiment/health",
            None,
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["plugin"], "custom-api-sentiment");

    let response = app
        .request(
            "POST",
            "/api/applications/app-1/plugin-api/sentiment/analyze",
            Some(json!({})),
            Some(TEST_USER),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Missing required field: text");
}
