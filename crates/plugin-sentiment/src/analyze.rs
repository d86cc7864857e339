//! Route handlers.

use std::sync::Arc;

use serde::Deserialize;

use agentbase_plugin_sdk::prelude::*;

use crate::plugin::{PLUGIN_NAME, PLUGIN_VERSION};

/// Default for the `maxTextLength` setting.
pub const DEFAULT_MAX_TEXT_LENGTH: u64 = 5000;
/// Default for the `defaultModel` setting.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are a sentiment analysis tool. Respond ONLY with a JSON object \
    with fields: sentiment (positive|negative|neutral), confidence (0-1), and summary (one sentence).";

/// Characters of the analyzed text echoed back in the response.
const ECHO_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    text: Option<Value>,
}

/// `POST /sentiment/analyze`
pub fn analyze() -> Arc<dyn Callback> {
    handler_fn(|ctx, args| async move {
        let request: BridgeRequest = match args.into_iter().next() {
            Some(value) => serde_json::from_value(value)?,
            None => return Err(CallbackError::failed("missing bridged request")),
        };

        let text = serde_json::from_value::<AnalyzeBody>(request.body)
            .ok()
            .and_then(|body| body.text)
            .and_then(|text| text.as_str().map(str::to_string))
            .filter(|text| !text.is_empty());
        let Some(text) = text else {
            return Ok(respond(400, json!({ "error": "Missing required field: text" })));
        };

        let max_len = ctx
            .setting("maxTextLength")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_TEXT_LENGTH);
        if text.chars().count() as u64 > max_len {
            return Ok(respond(
                400,
                json!({ "error": format!("Text exceeds the maximum length of {max_len} characters") }),
            ));
        }

        match run_analysis(&ctx, &text).await {
            Ok(body) => Ok(respond(200, body)),
            Err(e) => {
                ctx.api
                    .log(&format!("Sentiment analysis failed: {e}"), LogLevel::Error);
                Ok(respond(
                    500,
                    json!({ "error": "Analysis failed", "details": e.to_string() }),
                ))
            }
        }
    })
}

async fn run_analysis(ctx: &PluginContext, text: &str) -> Result<Value, CallbackError> {
    let model = ctx.setting_str("defaultModel").unwrap_or(DEFAULT_MODEL);

    let conversation = ctx
        .api
        .make_request(
            "/api/ai/conversations",
            OutboundRequest::post(json!({
                "title": "Sentiment Analysis",
                "system_prompt": SYSTEM_PROMPT,
                "model": model,
            })),
        )
        .await?;
    ensure_success(&conversation, "creating conversation")?;

    let conversation_id = match &conversation.body["id"] {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return Err(CallbackError::failed("conversation response has no id")),
    };

    let analysis = ctx
        .api
        .make_request(
            &format!("/api/ai/conversations/{conversation_id}/messages"),
            OutboundRequest::post(json!({
                "content": format!("Analyze the sentiment of this text: \"{text}\""),
            })),
        )
        .await?;
    ensure_success(&analysis, "sending message")?;

    Ok(json!({
        "text": text.chars().take(ECHO_CHARS).collect::<String>(),
        "analysis": analysis.body["response"],
        "usage": analysis.body["usage"],
    }))
}

fn ensure_success(response: &OutboundResponse, step: &str) -> Result<(), CallbackError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(CallbackError::failed(format!(
            "{step} returned status {}",
            response.status
        )))
    }
}

/// `GET /sentiment/health`
pub fn health() -> Arc<dyn Callback> {
    handler_fn(|_ctx, _args| async move {
        Ok(respond(
            200,
            json!({ "status": "ok", "plugin": PLUGIN_NAME, "version": PLUGIN_VERSION }),
        ))
    })
}

/// `api:routes`: appends this plugin's endpoints.
pub fn advertise_routes() -> Arc<dyn Callback> {
    filter_fn(|_ctx, routes, _args| async move {
        let mut routes = match routes {
            Value::Array(routes) => routes,
            _ => Vec::new(),
        };
        routes.push(route_descriptor(
            "POST",
            "/sentiment/analyze",
            "Analyze text sentiment using AI",
            PLUGIN_NAME,
        ));
        routes.push(route_descriptor(
            "GET",
            "/sentiment/health",
            "Sentiment plugin health check",
            PLUGIN_NAME,
        ));
        Ok(Value::Array(routes))
    })
}
