//! End-to-end behavior of the plugin runtime: lifecycle, dispatch,
//! filters, settings, restore and the route bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use agentbase_core::config::plugin::PluginConfig;
use agentbase_core::error::{AppError, ErrorKind};
use agentbase_core::result::AppResult;
use agentbase_plugin::prelude::*;
use agentbase_plugin::store::MemoryInstallationStore;
use agentbase_plugin::{
    BridgeRequest, Installation, InstallationState, InstallationStore, InvocationScope,
    PackageStatus, Runtime,
};

type Log = Arc<Mutex<Vec<String>>>;

fn runtime() -> Runtime {
    Runtime::in_memory(PluginConfig::default()).unwrap()
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn recorder(log: &Log, label: &'static str) -> Arc<dyn Callback> {
    let log = log.clone();
    hook_fn(move |ctx, _args| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(format!("{label}@{}", ctx.app_id));
            Ok(())
        }
    })
}

fn failing_hook() -> Arc<dyn Callback> {
    hook_fn(|_, _| async { Err(CallbackError::failed("boom")) })
}

fn appender(suffix: &'static str) -> Arc<dyn Callback> {
    filter_fn(move |_, value, _| async move {
        let text = value.as_str().unwrap_or_default();
        Ok(json!(format!("{text}{suffix}")))
    })
}

async fn install_active(rt: &Runtime, app: &str, package: PluginPackage) {
    let name = package.name().to_string();
    rt.manager()
        .install(app, "user-1", Arc::new(package))
        .await
        .unwrap();
    rt.manager().activate(app, &name).await.unwrap();
}

#[tokio::test]
async fn test_install_applies_default_settings() {
    let rt = runtime();
    let package = PluginPackage::builder("hello", "1.0.0")
        .setting("greeting", SettingField::string("Greeting").with_default("hi"))
        .setting("enabled", SettingField::boolean("Enabled").with_default(true))
        .setting("note", SettingField::string("Note"))
        .build();

    let inst = rt
        .manager()
        .install("app", "user-1", Arc::new(package))
        .await
        .unwrap();

    assert_eq!(inst.state, InstallationState::Installed);
    assert_eq!(inst.installed_by, "user-1");
    assert_eq!(inst.settings["greeting"], json!("hi"));
    assert_eq!(inst.settings["enabled"], json!(true));
    assert!(!inst.settings.contains_key("note"));
}

#[tokio::test]
async fn test_duplicate_install_conflicts() {
    let rt = runtime();
    let package = Arc::new(PluginPackage::builder("hello", "1.0.0").build());
    rt.manager().install("app", "u", package.clone()).await.unwrap();

    let err = rt.manager().install("app", "u", package.clone()).await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));

    rt.manager().install("other-app", "u", package).await.unwrap();
}

#[tokio::test]
async fn test_invalid_manifest_is_rejected() {
    let rt = runtime();
    let package = Arc::new(PluginPackage::builder("hello", "one").build());
    let err = rt.manager().install("app", "u", package).await.unwrap_err();
    assert!(err.is(ErrorKind::Validation));
    assert!(rt.manager().list_installed("app").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_installs_produce_one_record() {
    let rt = Arc::new(runtime());
    let package = Arc::new(PluginPackage::builder("hello", "1.0.0").build());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rt = rt.clone();
            let package = package.clone();
            tokio::spawn(async move { rt.manager().install("app", "u", package).await })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => assert!(e.is(ErrorKind::Conflict)),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(rt.manager().history("app", "hello").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_actions_run_in_activation_order() {
    let rt = runtime();
    let calls = log();

    for name in ["second", "first", "third"] {
        let package = PluginPackage::builder(name, "1.0.0")
            .hook(points::APP_INIT, recorder(&calls, name))
            .build();
        install_active(&rt, "app", package).await;
    }

    let report = rt
        .dispatch(points::APP_INIT, &InvocationScope::new("app"), &[])
        .await;

    assert_eq!(report.invoked, 3);
    assert!(report.is_clean());
    assert_eq!(entries(&calls), vec!["second@app", "first@app", "third@app"]);
}

#[tokio::test]
async fn test_dispatch_without_callbacks_is_noop() {
    let rt = runtime();
    let report = rt
        .dispatch("nothing:here", &InvocationScope::new("app"), &[])
        .await;
    assert_eq!(report.invoked, 0);

    let value = rt
        .filter("nothing:here", &InvocationScope::new("app"), json!("x"), &[])
        .await;
    assert_eq!(value, json!("x"));
}

#[tokio::test]
async fn test_failing_action_does_not_stop_others() {
    let rt = runtime();
    let calls = log();

    for (name, callback) in [
        ("first", recorder(&calls, "first")),
        ("broken", failing_hook()),
        ("third", recorder(&calls, "third")),
    ] {
        install_active(
            &rt,
            "app",
            PluginPackage::builder(name, "1.0.0")
                .hook("conversation:beforeMessage", callback)
                .build(),
        )
        .await;
    }

    let report = rt
        .dispatch("conversation:beforeMessage", &InvocationScope::new("app"), &[json!("hi")])
        .await;

    assert_eq!(report.invoked, 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].plugin_id, "broken");
    assert_eq!(entries(&calls), vec!["first@app", "third@app"]);
}

#[tokio::test]
async fn test_applications_are_isolated() {
    let rt = runtime();
    let calls = log();
    install_active(
        &rt,
        "app-a",
        PluginPackage::builder("hello", "1.0.0")
            .hook(points::APP_INIT, recorder(&calls, "hello"))
            .build(),
    )
    .await;

    let report = rt
        .dispatch(points::APP_INIT, &InvocationScope::new("app-b"), &[])
        .await;
    assert_eq!(report.invoked, 0);
    assert!(entries(&calls).is_empty());
}

#[tokio::test]
async fn test_filters_chain_in_order() {
    let rt = runtime();
    install_active(
        &rt,
        "app",
        PluginPackage::builder("a", "1.0.0")
            .filter(points::RESPONSE_MODIFY, appender("-a"))
            .build(),
    )
    .await;
    install_active(
        &rt,
        "app",
        PluginPackage::builder("b", "1.0.0")
            .filter(points::RESPONSE_MODIFY, appender("-b"))
            .build(),
    )
    .await;

    let value = rt
        .filter(points::RESPONSE_MODIFY, &InvocationScope::new("app"), json!("x"), &[])
        .await;
    assert_eq!(value, json!("x-a-b"));
}

#[tokio::test]
async fn test_failing_filter_returns_last_good_value() {
    let rt = runtime();
    for (name, callback) in [
        ("a", appender("-a")),
        (
            "broken",
            filter_fn(|_, _, _| async { Err(CallbackError::failed("nope")) }),
        ),
        ("c", appender("-c")),
    ] {
        install_active(
            &rt,
            "app",
            PluginPackage::builder(name, "1.0.0")
                .filter(points::RESPONSE_MODIFY, callback)
                .build(),
        )
        .await;
    }

    let value = rt
        .filter(points::RESPONSE_MODIFY, &InvocationScope::new("app"), json!("x"), &[])
        .await;
    assert_eq!(value, json!("x-a"));
}

#[tokio::test]
async fn test_filter_receives_extra_arguments() {
    let rt = runtime();
    install_active(
        &rt,
        "app",
        PluginPackage::builder("a", "1.0.0")
            .filter(
                "title:format",
                filter_fn(|_, value, args| async move {
                    let suffix = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(json!(format!("{}{suffix}", value.as_str().unwrap_or_default())))
                }),
            )
            .build(),
    )
    .await;

    let value = rt
        .filter("title:format", &InvocationScope::new("app"), json!("x"), &[json!("!")])
        .await;
    assert_eq!(value, json!("x!"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_callback_times_out() {
    let config = PluginConfig {
        callback_timeout_ms: 50,
        ..PluginConfig::default()
    };
    let rt = Runtime::in_memory(config).unwrap();
    let calls = log();

    install_active(
        &rt,
        "app",
        PluginPackage::builder("slow", "1.0.0")
            .hook(
                points::APP_INIT,
                hook_fn(|_, _| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }),
            )
            .build(),
    )
    .await;
    install_active(
        &rt,
        "app",
        PluginPackage::builder("fast", "1.0.0")
            .hook(points::APP_INIT, recorder(&calls, "fast"))
            .build(),
    )
    .await;

    let report = rt
        .dispatch(points::APP_INIT, &InvocationScope::new("app"), &[])
        .await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.is_timeout());
    assert_eq!(entries(&calls), vec!["fast@app"]);
}

#[tokio::test]
async fn test_activate_is_idempotent_and_deactivate_removes_callbacks() {
    let rt = runtime();
    let calls = log();
    let package = PluginPackage::builder("hello", "1.0.0")
        .hook(points::APP_INIT, recorder(&calls, "hello"))
        .build();
    install_active(&rt, "app", package).await;

    let again = rt.manager().activate("app", "hello").await.unwrap();
    assert_eq!(again.state, InstallationState::Active);
    assert_eq!(
        rt.registry()
            .owners(agentbase_plugin::CallbackKind::Action, "app", points::APP_INIT),
        vec!["hello"]
    );

    let inst = rt.manager().deactivate("app", "hello").await.unwrap();
    assert_eq!(inst.state, InstallationState::Inactive);
    assert!(!rt.registry().contains_plugin("app", "hello"));

    rt.dispatch(points::APP_INIT, &InvocationScope::new("app"), &[])
        .await;
    assert!(entries(&calls).is_empty());

    let err = rt.manager().deactivate("app", "hello").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_lifecycle_on_unknown_plugin_is_not_found() {
    let rt = runtime();
    for result in [
        rt.manager().activate("app", "ghost").await,
        rt.manager().deactivate("app", "ghost").await,
        rt.manager().uninstall("app", "ghost").await,
        rt.manager().set_setting("app", "ghost", "k", json!(1)).await,
    ] {
        assert!(result.unwrap_err().is(ErrorKind::NotFound));
    }
}

#[tokio::test]
async fn test_lifecycle_callbacks_run_in_order() {
    let rt = runtime();
    let calls = log();
    let package = PluginPackage::builder("hello", "1.0.0")
        .hook(points::APP_INIT, recorder(&calls, "hook"))
        .on_activate({
            let calls = calls.clone();
            lifecycle_fn(move |ctx| {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push(format!("activate@{}", ctx.app_id));
                    Ok(())
                }
            })
        })
        .on_deactivate({
            let calls = calls.clone();
            lifecycle_fn(move |ctx| {
                let calls = calls.clone();
                async move {
                    calls.lock().unwrap().push(format!("deactivate@{}", ctx.app_id));
                    Ok(())
                }
            })
        })
        .build();

    install_active(&rt, "app", package).await;
    rt.manager().uninstall("app", "hello").await.unwrap();

    assert_eq!(entries(&calls), vec!["activate@app", "deactivate@app"]);
    assert!(!rt.registry().contains_plugin("app", "hello"));
}

#[tokio::test]
async fn test_failing_on_activate_keeps_plugin_active() {
    let rt = runtime();
    let package = PluginPackage::builder("hello", "1.0.0")
        .hook(points::APP_INIT, hook_fn(|_, _| async { Ok(()) }))
        .on_activate(lifecycle_fn(|_| async { Err(CallbackError::failed("bad start")) }))
        .on_deactivate(lifecycle_fn(|_| async { Err(CallbackError::failed("bad stop")) }))
        .build();

    install_active(&rt, "app", package).await;
    assert_eq!(
        rt.manager().get("app", "hello").await.unwrap().state,
        InstallationState::Active
    );

    let inst = rt.manager().uninstall("app", "hello").await.unwrap();
    assert_eq!(inst.state, InstallationState::Uninstalled);
    assert!(!rt.registry().contains_plugin("app", "hello"));
}

#[tokio::test]
async fn test_uninstall_keeps_history_and_allows_reinstall() {
    let rt = runtime();
    let package = Arc::new(PluginPackage::builder("hello", "1.0.0").build());
    rt.manager().install("app", "u", package.clone()).await.unwrap();
    rt.manager().uninstall("app", "hello").await.unwrap();

    assert!(rt.manager().list_installed("app").await.unwrap().is_empty());
    let err = rt.manager().get("app", "hello").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    rt.manager().install("app", "u", package).await.unwrap();
    let history = rt.manager().history("app", "hello").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].state, InstallationState::Uninstalled);
    assert_eq!(history[1].state, InstallationState::Installed);
}

#[tokio::test]
async fn test_settings_are_validated() {
    let rt = runtime();
    let package = PluginPackage::builder("sentiment", "1.0.0")
        .setting("maxTextLength", SettingField::number("Max").with_default(5000))
        .setting("model", SettingField::select("Model", ["small", "large"]).with_default("small"))
        .build();
    rt.manager()
        .install("app", "u", Arc::new(package))
        .await
        .unwrap();

    let inst = rt
        .manager()
        .set_setting("app", "sentiment", "maxTextLength", json!(100))
        .await
        .unwrap();
    assert_eq!(inst.settings["maxTextLength"], json!(100));

    let err = rt
        .manager()
        .set_setting("app", "sentiment", "maxTextLength", json!("lots"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Validation));

    let mut bulk = Map::new();
    bulk.insert("model".to_string(), json!("large"));
    bulk.insert("unknown".to_string(), json!(true));
    let err = rt
        .manager()
        .update_settings("app", "sentiment", bulk)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Validation));

    let inst = rt.manager().get("app", "sentiment").await.unwrap();
    assert_eq!(inst.settings["model"], json!("small"));
    assert_eq!(inst.settings["maxTextLength"], json!(100));
}

#[tokio::test]
async fn test_select_setting_rejects_value_outside_options() {
    let rt = runtime();
    let package = PluginPackage::builder("sentiment", "1.0.0")
        .setting("model", SettingField::select("Model", ["small", "large"]).with_default("small"))
        .build();
    rt.manager()
        .install("app", "u", Arc::new(package))
        .await
        .unwrap();

    let err = rt
        .manager()
        .set_setting("app", "sentiment", "model", json!("huge"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Validation));
    let inst = rt.manager().get("app", "sentiment").await.unwrap();
    assert_eq!(inst.settings["model"], json!("small"));

    let inst = rt
        .manager()
        .set_setting("app", "sentiment", "model", json!("large"))
        .await
        .unwrap();
    assert_eq!(inst.settings["model"], json!("large"));
}

#[tokio::test]
async fn test_context_exposes_owner_settings_and_persists_set_config() {
    let rt = runtime();
    let seen = log();
    let package = PluginPackage::builder("counter", "1.0.0")
        .setting("count", SettingField::number("Count").with_default(0))
        .hook("counter:bump", {
            let seen = seen.clone();
            hook_fn(move |ctx, _| {
                let seen = seen.clone();
                async move {
                    let current = ctx.setting_f64("count").unwrap_or_default();
                    ctx.api.set_config("count", json!(current + 1.0)).await?;
                    let stored = ctx.api.get_config("count").await.unwrap_or_default();
                    seen.lock().unwrap().push(format!("{}:{stored}", ctx.plugin_id));
                    Ok(())
                }
            })
        })
        .build();
    install_active(&rt, "app", package).await;

    let scope = InvocationScope::new("app").with_user("user-7");
    rt.dispatch("counter:bump", &scope, &[]).await;
    rt.dispatch("counter:bump", &scope, &[]).await;

    assert_eq!(entries(&seen), vec!["counter:1.0", "counter:2.0"]);
    let inst = rt.manager().get("app", "counter").await.unwrap();
    assert_eq!(inst.settings["count"], json!(2.0));
}

#[tokio::test]
async fn test_set_config_rejects_undeclared_keys() {
    let rt = runtime();
    let package = PluginPackage::builder("sneaky", "1.0.0")
        .hook(
            "sneaky:run",
            hook_fn(|ctx, _| async move {
                ctx.api.set_config("secret", json!("x")).await?;
                Ok(())
            }),
        )
        .build();
    install_active(&rt, "app", package).await;

    let report = rt
        .dispatch("sneaky:run", &InvocationScope::new("app"), &[])
        .await;
    assert_eq!(report.failures.len(), 1);
    assert!(rt.manager().get("app", "sneaky").await.unwrap().settings.is_empty());
}

#[tokio::test]
async fn test_outbound_request_without_capability_is_denied() {
    let rt = runtime();
    let package = PluginPackage::builder("caller", "1.0.0")
        .route(
            "caller/go",
            handler_fn(|ctx, _| async move {
                match ctx
                    .api
                    .make_request("/api/ai/conversations", OutboundRequest::get())
                    .await
                {
                    Ok(_) => Ok(json!({ "status": 200, "body": "sent" })),
                    Err(e) => Ok(json!({ "status": 403, "body": e.to_string() })),
                }
            }),
        )
        .build();
    install_active(&rt, "app", package).await;

    let response = rt
        .bridge()
        .handle(
            &InvocationScope::new("app"),
            BridgeRequest {
                method: "POST".to_string(),
                path: "caller/go".to_string(),
                ..BridgeRequest::default()
            },
        )
        .await;
    assert_eq!(response.status, 403);
    assert!(response.body.as_str().unwrap().contains("platform:api"));
}

#[tokio::test]
async fn test_outbound_request_cannot_reach_management_routes() {
    let rt = runtime();
    let package = PluginPackage::builder("caller", "1.0.0")
        .permission("platform:api")
        .route(
            "caller/go",
            handler_fn(|ctx, _| async move {
                let outcome = ctx
                    .api
                    .make_request(
                        "/api/applications/victim-app/plugins/other-plugin/settings",
                        OutboundRequest::get().header("x-user-id", "admin"),
                    )
                    .await;
                match outcome {
                    Ok(_) => Ok(json!({ "status": 200, "body": "sent" })),
                    Err(e) if e.is(ErrorKind::Permission) => {
                        Ok(json!({ "status": 403, "body": e.to_string() }))
                    }
                    Err(e) => Ok(json!({ "status": 500, "body": e.to_string() })),
                }
            }),
        )
        .build();
    install_active(&rt, "app", package).await;

    let response = rt
        .bridge()
        .handle(
            &InvocationScope::new("app"),
            BridgeRequest {
                path: "caller/go".to_string(),
                ..BridgeRequest::default()
            },
        )
        .await;
    assert_eq!(response.status, 403);
}

#[tokio::test]
async fn test_lifecycle_events_are_dispatched() {
    let rt = runtime();
    let events = log();

    let observer = PluginPackage::builder("observer", "1.0.0")
        .hook(points::PLUGIN_INSTALLED, event_recorder(&events, "installed"))
        .hook(points::PLUGIN_ACTIVATED, event_recorder(&events, "activated"))
        .hook(points::PLUGIN_DEACTIVATED, event_recorder(&events, "deactivated"))
        .hook(points::PLUGIN_UNINSTALLED, event_recorder(&events, "uninstalled"))
        .build();
    install_active(&rt, "app", observer).await;

    let target = Arc::new(PluginPackage::builder("target", "1.0.0").build());
    rt.manager().install("app", "u", target).await.unwrap();
    rt.manager().activate("app", "target").await.unwrap();
    rt.manager().deactivate("app", "target").await.unwrap();
    rt.manager().uninstall("app", "target").await.unwrap();

    assert_eq!(
        entries(&events),
        vec![
            "activated:observer",
            "installed:target",
            "activated:target",
            "deactivated:target",
            "uninstalled:target"
        ]
    );
}

fn event_recorder(log: &Log, label: &'static str) -> Arc<dyn Callback> {
    let log = log.clone();
    hook_fn(move |_, args| {
        let log = log.clone();
        async move {
            let plugin = args[0]["plugin"].as_str().unwrap_or_default().to_string();
            log.lock().unwrap().push(format!("{label}:{plugin}"));
            Ok(())
        }
    })
}

#[tokio::test]
async fn test_restore_reregisters_active_installations() {
    let store: Arc<dyn InstallationStore> = Arc::new(MemoryInstallationStore::new());
    let calls = log();
    let package = || {
        PluginPackage::builder("hello", "1.0.0")
            .hook(points::APP_INIT, recorder(&calls, "hello"))
            .build()
    };

    {
        let rt = Runtime::new(PluginConfig::default(), store.clone()).unwrap();
        install_active(&rt, "app", package()).await;
        let other = Arc::new(PluginPackage::builder("idle", "1.0.0").build());
        rt.manager().install("app", "u", other).await.unwrap();
    }

    let rt = Runtime::new(PluginConfig::default(), store).unwrap();
    rt.publish(package()).await.unwrap();

    let report = rt.restore().await.unwrap();
    assert_eq!(report.restored, 1);
    assert!(report.skipped.is_empty());
    assert!(rt.registry().contains_plugin("app", "hello"));
    assert!(!rt.registry().contains_plugin("app", "idle"));

    // Second restore must not register twice.
    rt.restore().await.unwrap();

    let booted = rt.boot_applications().await.unwrap();
    assert_eq!(booted, 1);
    assert_eq!(entries(&calls), vec!["hello@app"]);
}

#[tokio::test]
async fn test_restore_skips_packages_missing_from_catalog() {
    let store: Arc<dyn InstallationStore> = Arc::new(MemoryInstallationStore::new());
    {
        let rt = Runtime::new(PluginConfig::default(), store.clone()).unwrap();
        install_active(&rt, "app", PluginPackage::builder("gone", "1.0.0").build()).await;
    }

    let rt = Runtime::new(PluginConfig::default(), store).unwrap();
    let report = rt.restore().await.unwrap();
    assert_eq!(report.restored, 0);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        rt.manager().get("app", "gone").await.unwrap().state,
        InstallationState::Active
    );
}

#[tokio::test]
async fn test_bridge_serves_claimed_routes() {
    let rt = runtime();
    let package = PluginPackage::builder("echo", "1.0.0")
        .route(
            "/echo/say",
            handler_fn(|_, args| async move {
                let request: BridgeRequest = serde_json::from_value(args[0].clone())?;
                Ok(json!({ "status": 201, "body": { "method": request.method, "got": request.body } }))
            }),
        )
        .route("echo/none", handler_fn(|_, _| async { Ok(Value::Null) }))
        .route(
            "echo/fail",
            handler_fn(|_, _| async { Err(CallbackError::failed("secret detail")) }),
        )
        .build();
    install_active(&rt, "app", package).await;
    let scope = InvocationScope::new("app");

    let response = rt
        .bridge()
        .handle(
            &scope,
            BridgeRequest {
                method: "POST".to_string(),
                path: "echo/say/".to_string(),
                body: json!({ "x": 1 }),
                ..BridgeRequest::default()
            },
        )
        .await;
    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({ "method": "POST", "got": { "x": 1 } }));

    let response = rt
        .bridge()
        .handle(&scope, BridgeRequest { path: "echo/none".to_string(), ..BridgeRequest::default() })
        .await;
    assert_eq!(response.status, 204);

    let response = rt
        .bridge()
        .handle(&scope, BridgeRequest { path: "echo/fail".to_string(), ..BridgeRequest::default() })
        .await;
    assert_eq!(response.status, 500);
    assert!(!response.body.to_string().contains("secret detail"));

    let response = rt
        .bridge()
        .handle(&scope, BridgeRequest { path: "echo/missing".to_string(), ..BridgeRequest::default() })
        .await;
    assert_eq!(response.status, 404);

    let response = rt
        .bridge()
        .handle(
            &InvocationScope::new("other-app"),
            BridgeRequest { path: "echo/say".to_string(), ..BridgeRequest::default() },
        )
        .await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_first_registrant_wins_contested_route() {
    let rt = runtime();
    for name in ["first", "second"] {
        let label = name.to_string();
        let package = PluginPackage::builder(name, "1.0.0")
            .route(
                "shared/ping",
                handler_fn(move |_, _| {
                    let label = label.clone();
                    async move { Ok(json!(label)) }
                }),
            )
            .build();
        install_active(&rt, "app", package).await;
    }

    assert_eq!(rt.bridge().claimants("app", "shared/ping"), vec!["first", "second"]);
    let response = rt
        .bridge()
        .handle(
            &InvocationScope::new("app"),
            BridgeRequest { path: "shared/ping".to_string(), ..BridgeRequest::default() },
        )
        .await;
    assert_eq!(response.body, json!("first"));

    rt.manager().deactivate("app", "first").await.unwrap();
    let response = rt
        .bridge()
        .handle(
            &InvocationScope::new("app"),
            BridgeRequest { path: "shared/ping".to_string(), ..BridgeRequest::default() },
        )
        .await;
    assert_eq!(response.body, json!("second"));
}

#[tokio::test]
async fn test_routes_filter_collects_descriptors() {
    let rt = runtime();
    let package = PluginPackage::builder("lister", "1.0.0")
        .filter(
            points::API_ROUTES,
            filter_fn(|ctx, value, _| async move {
                let mut routes = value.as_array().cloned().unwrap_or_default();
                routes.push(json!({
                    "method": "POST",
                    "path": "lister/run",
                    "description": "Run it",
                    "plugin": ctx.plugin_id,
                }));
                routes.push(json!({ "bogus": true }));
                Ok(Value::Array(routes))
            }),
        )
        .build();
    install_active(&rt, "app", package).await;

    let routes = rt.bridge().routes(&InvocationScope::new("app")).await;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].path, "/lister/run");
    assert_eq!(routes[0].plugin, "lister");

    assert!(rt.bridge().routes(&InvocationScope::new("empty")).await.is_empty());
}

#[tokio::test]
async fn test_deprecated_plugin_cannot_be_installed() {
    let rt = runtime();
    rt.publish(PluginPackage::builder("legacy", "1.0.0").build())
        .await
        .unwrap();
    rt.manager()
        .install_from_catalog("app", "u", "legacy", None)
        .await
        .unwrap();

    rt.catalog().deprecate("legacy").await.unwrap();
    assert_eq!(
        rt.catalog().status("legacy").await,
        Some(PackageStatus::Deprecated)
    );

    let err = rt
        .manager()
        .install_from_catalog("other-app", "u", "legacy", None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Conflict));

    // Existing installations keep working.
    rt.manager().activate("app", "legacy").await.unwrap();
}

/// Memory store whose lifecycle writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryInstallationStore,
    fail_lifecycle: AtomicBool,
}

#[async_trait]
impl InstallationStore for FlakyStore {
    async fn insert(&self, installation: &Installation) -> AppResult<()> {
        self.inner.insert(installation).await
    }

    async fn find_live(&self, app_id: &str, plugin_id: &str) -> AppResult<Option<Installation>> {
        self.inner.find_live(app_id, plugin_id).await
    }

    async fn save_lifecycle(&self, installation: &Installation) -> AppResult<()> {
        if self.fail_lifecycle.load(Ordering::SeqCst) {
            return Err(AppError::internal("store unavailable"));
        }
        self.inner.save_lifecycle(installation).await
    }

    async fn merge_settings(&self, id: Uuid, values: &Map<String, Value>) -> AppResult<Installation> {
        self.inner.merge_settings(id, values).await
    }

    async fn list_by_app(&self, app_id: &str) -> AppResult<Vec<Installation>> {
        self.inner.list_by_app(app_id).await
    }

    async fn list_by_state(&self, state: InstallationState) -> AppResult<Vec<Installation>> {
        self.inner.list_by_state(state).await
    }

    async fn history(&self, app_id: &str, plugin_id: &str) -> AppResult<Vec<Installation>> {
        self.inner.history(app_id, plugin_id).await
    }
}

#[tokio::test]
async fn test_failed_persist_keeps_plugin_registered() {
    let store = Arc::new(FlakyStore::default());
    let rt = Runtime::new(PluginConfig::default(), store.clone()).unwrap();
    let calls = log();
    install_active(
        &rt,
        "app",
        PluginPackage::builder("hello", "1.0.0")
            .hook(points::APP_INIT, recorder(&calls, "hello"))
            .build(),
    )
    .await;

    store.fail_lifecycle.store(true, Ordering::SeqCst);
    assert!(rt.manager().deactivate("app", "hello").await.is_err());
    assert!(rt.manager().uninstall("app", "hello").await.is_err());
    store.fail_lifecycle.store(false, Ordering::SeqCst);

    let inst = rt.manager().get("app", "hello").await.unwrap();
    assert_eq!(inst.state, InstallationState::Active);
    assert!(rt.registry().contains_plugin("app", "hello"));
    assert_eq!(
        rt.registry()
            .owners(agentbase_plugin::CallbackKind::Action, "app", points::APP_INIT),
        vec!["hello"]
    );

    rt.dispatch(points::APP_INIT, &InvocationScope::new("app"), &[])
        .await;
    assert_eq!(entries(&calls), vec!["hello@app"]);

    rt.manager().deactivate("app", "hello").await.unwrap();
    assert!(!rt.registry().contains_plugin("app", "hello"));
}
