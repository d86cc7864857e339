//! Thin HTTP client for the management API.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use agentbase_core::error::{AppError, ErrorKind};

/// Client bound to one server and, optionally, one user id.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
}

impl ApiClient {
    /// Creates a client for `base_url` (for example `http://127.0.0.1:8080`).
    pub fn new(base_url: &str, user_id: Option<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("agentbase-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        })
    }

    /// GET and return the `data` field.
    pub async fn get(&self, path: &str) -> Result<Value, AppError> {
        self.send(Method::GET, path, None::<&Value>).await
    }

    /// POST a JSON body.
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, AppError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// PUT a JSON body (or none).
    pub async fn put<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<Value, AppError> {
        self.send(Method::PUT, path, body).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> Result<Value, AppError> {
        self.send(Method::DELETE, path, None::<&Value>).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, AppError> {
        let url = format!("{}/api{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = self.http.request(method, &url);
        if let Some(user_id) = &self.user_id {
            request = request.header("x-user-id", user_id);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ServiceUnavailable,
                format!("Cannot reach {}", self.base_url),
                e,
            )
        })?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("Request failed with status {status}"));
            return Err(AppError::new(kind_for_status(status), message));
        }

        Ok(payload.get("data").cloned().unwrap_or(payload))
    }
}

/// Maps an HTTP error status back to an error kind.
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST => ErrorKind::Validation,
        StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
        StatusCode::FORBIDDEN => ErrorKind::Permission,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::CONFLICT => ErrorKind::Conflict,
        StatusCode::SERVICE_UNAVAILABLE => ErrorKind::ServiceUnavailable,
        s if s.is_server_error() => ErrorKind::Internal,
        _ => ErrorKind::ExternalService,
    }
}
