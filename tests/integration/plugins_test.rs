//! Integration tests for plugin management over HTTP.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::{TEST_USER, TestApp};

const APP: &str = "app-1";

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["marketplace_plugins"], 2);
}

#[tokio::test]
async fn test_marketplace_lists_bundled_plugins() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/api/marketplace", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["custom-api-sentiment", "hello-world"]);

    let response = app
        .request("GET", "/api/marketplace/hello-world", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["settings"]["enabled"]["type"], "boolean");
}

#[tokio::test]
async fn test_deprecated_plugin_is_filtered_and_not_installable() {
    let app = TestApp::new().await;

    let response = app
        .request("PUT", "/api/marketplace/hello-world/deprecate", None, None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            "PUT",
            "/api/marketplace/hello-world/deprecate",
            None,
            Some(TEST_USER),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "deprecated");

    let response = app
        .request("GET", "/api/marketplace?status=deprecated", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let listed = response.body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "hello-world");

    let response = app
        .request("GET", "/api/marketplace?status=published", None, None)
        .await;
    let listed = response.body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "custom-api-sentiment");

    let response = app
        .request("GET", "/api/marketplace?status=draft", None, None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request(
            "POST",
            &format!("/api/applications/{APP}/plugins"),
            Some(json!({ "plugin": "hello-world" })),
            Some(TEST_USER),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_install_requires_user() {
    let app = TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/applications/app-1/plugins",
            Some(json!({ "plugin": "hello-world" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_install_applies_defaults_and_rejects_duplicates() {
    let app = TestApp::new().await;
    let body = json!({ "plugin": "hello-world" });

    let response = app
        .request("POST", "/api/applications/app-1/plugins", Some(body.clone()), Some(TEST_USER))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let data = &response.body["data"];
    assert_eq!(data["state"], "installed");
    assert_eq!(data["version"], "1.0.0");
    assert_eq!(data["installed_by"], TEST_USER);
    assert_eq!(data["settings"]["greeting"], "Hello from the plugin!");
    assert_eq!(data["settings"]["enabled"], true);

    let response = app
        .request("POST", "/api/applications/app-1/plugins", Some(body), Some(TEST_USER))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "CONFLICT");
}

#[tokio::test]
async fn test_install_unknown_plugin() {
    let app = TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/api/applications/app-1/plugins",
            Some(json!({ "plugin": "does-not-exist" })),
            Some(TEST_USER),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .request(
            "POST",
            "/api/applications/app-1/plugins",
            Some(json!({ "plugin": "" })),
            Some(TEST_USER),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activate_registers_hooks() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request("GET", "/api/applications/app-1/plugins/hello-world", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["state"], "active");
    assert!(response.body["data"]["activated_at"].is_string());

    let response = app.request("GET", "/api/applications/app-1/hooks", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    let summary = &response.body["data"];
    assert_eq!(summary["actions"]["app:init"], json!(["hello-world"]));
    assert_eq!(
        summary["actions"]["conversation:beforeMessage"],
        json!(["hello-world"])
    );
    assert_eq!(summary["filters"]["response:modify"], json!(["hello-world"]));

    // Registries are scoped per application.
    let response = app.request("GET", "/api/applications/app-2/hooks", None, None).await;
    assert_eq!(response.body["data"]["actions"], json!({}));
}

#[tokio::test]
async fn test_activate_is_idempotent() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request("PUT", "/api/applications/app-1/plugins/hello-world/activate", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    assert_eq!(
        app.runtime
            .registry()
            .summary(APP)
            .actions
            .get("app:init")
            .map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn test_deactivate_unregisters_hooks() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request("PUT", "/api/applications/app-1/plugins/hello-world/deactivate", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["state"], "inactive");

    let response = app.request("GET", "/api/applications/app-1/hooks", None, None).await;
    assert_eq!(response.body["data"]["actions"], json!({}));
    assert_eq!(response.body["data"]["filters"], json!({}));

    let response = app
        .request("PUT", "/api/applications/app-1/plugins/hello-world/deactivate", None, None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lifecycle_on_unknown_installation() {
    let app = TestApp::new().await;

    for (method, path) in [
        ("GET", "/api/applications/app-1/plugins/hello-world"),
        ("PUT", "/api/applications/app-1/plugins/hello-world/activate"),
        ("DELETE", "/api/applications/app-1/plugins/hello-world"),
    ] {
        let response = app.request(method, path, None, None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{method} {path}");
        assert_eq!(response.body["error"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_update_setting_validates_type() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request(
            "PUT",
            "/api/applications/app-1/plugins/hello-world/settings/enabled",
            Some(json!({ "value": "yes" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "VALIDATION_ERROR");

    let response = app
        .request(
            "PUT",
            "/api/applications/app-1/plugins/hello-world/settings/greeting",
            Some(json!({ "value": "Hi!" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["settings"]["greeting"], "Hi!");
    assert_eq!(response.body["data"]["settings"]["enabled"], true);
}

#[tokio::test]
async fn test_bulk_settings_are_all_or_nothing() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request(
            "PUT",
            "/api/applications/app-1/plugins/hello-world/settings",
            Some(json!({ "settings": { "greeting": "Hey", "enabled": 3 } })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .request("GET", "/api/applications/app-1/plugins/hello-world", None, None)
        .await;
    assert_eq!(response.body["data"]["settings"]["greeting"], "Hello from the plugin!");

    let response = app
        .request(
            "PUT",
            "/api/applications/app-1/plugins/hello-world/settings",
            Some(json!({ "settings": { "greeting": "Hey", "enabled": false } })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["settings"]["greeting"], "Hey");
    assert_eq!(response.body["data"]["settings"]["enabled"], false);
}

#[tokio::test]
async fn test_uninstall_keeps_history_and_allows_reinstall() {
    let app = TestApp::new().await;
    app.install_active(APP, "hello-world").await;

    let response = app
        .request("DELETE", "/api/applications/app-1/plugins/hello-world", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["state"], "uninstalled");

    let response = app.request("GET", "/api/applications/app-1/plugins", None, None).await;
    assert_eq!(response.body["data"], json!([]));

    app.install_active(APP, "hello-world").await;

    let response = app
        .request("GET", "/api/applications/app-1/plugins/hello-world/history", None, None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let states: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["state"].as_str().unwrap())
        .collect();
    assert_eq!(states.len(), 2);
    assert!(states.contains(&"uninstalled"));
    assert!(states.contains(&"active"));
}
