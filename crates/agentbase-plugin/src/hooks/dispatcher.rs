//! Hook dispatcher: runs actions and filter pipelines for one application.
//!
//! Actions:
//! - Every registered callback runs, in registration order.
//! - A failing or timed-out callback is logged and recorded; the rest still run.
//!
//! Filters:
//! - The value is threaded through the callbacks in registration order.
//! - On the first failure the pipeline stops and the value as of the last
//!   successful callback is returned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::api::context::{ContextFactory, InvocationScope};
use crate::error::CallbackError;

use super::callback::Callback;
use super::definitions::CallbackKind;
use super::registry::{HookRegistry, RegisteredCallback};

/// A callback that failed during a dispatch.
#[derive(Debug, Clone)]
pub struct CallbackFailure {
    /// Plugin that owns the callback.
    pub plugin_id: String,
    /// Extension point being dispatched.
    pub point: String,
    /// What went wrong.
    pub error: CallbackError,
}

/// Outcome of an action dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Number of callbacks invoked.
    pub invoked: usize,
    /// Callbacks that failed or timed out.
    pub failures: Vec<CallbackFailure>,
}

impl DispatchReport {
    /// Number of callbacks that completed successfully.
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    /// Returns true if no callback failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatches actions and filters to registered callbacks.
pub struct HookDispatcher {
    registry: Arc<HookRegistry>,
    contexts: Arc<ContextFactory>,
    timeout: Duration,
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HookDispatcher {
    /// Creates a dispatcher bounding every callback by `timeout`.
    pub fn new(registry: Arc<HookRegistry>, contexts: Arc<ContextFactory>, timeout: Duration) -> Self {
        Self {
            registry,
            contexts,
            timeout,
        }
    }

    /// Returns the per-callback timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs every action registered at `point` for the scope's application.
    ///
    /// Never fails; callback failures are logged and reported.
    pub async fn dispatch(&self, point: &str, scope: &InvocationScope, args: &[Value]) -> DispatchReport {
        let entries = self.registry.list(CallbackKind::Action, &scope.app_id, point);
        let mut report = DispatchReport::default();

        if entries.is_empty() {
            return report;
        }

        debug!(
            point = %point,
            app_id = %scope.app_id,
            callback_count = entries.len(),
            "Dispatching action"
        );

        for entry in &entries {
            report.invoked += 1;
            if let Err(err) = self.invoke(entry, scope, args).await {
                error!(
                    point = %point,
                    app_id = %scope.app_id,
                    plugin_id = %entry.plugin_id,
                    error = %err,
                    "Action callback failed"
                );
                report.failures.push(CallbackFailure {
                    plugin_id: entry.plugin_id.clone(),
                    point: point.to_string(),
                    error: err,
                });
            }
        }

        report
    }

    /// Threads `value` through every filter registered at `point`.
    ///
    /// Each filter receives the current value followed by `args`. Returns
    /// `value` unchanged when no filter is registered.
    pub async fn filter(
        &self,
        point: &str,
        scope: &InvocationScope,
        value: Value,
        args: &[Value],
    ) -> Value {
        let entries = self.registry.list(CallbackKind::Filter, &scope.app_id, point);
        let mut current = value;

        for entry in &entries {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(current.clone());
            call_args.extend_from_slice(args);

            match self.invoke(entry, scope, &call_args).await {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(
                        point = %point,
                        app_id = %scope.app_id,
                        plugin_id = %entry.plugin_id,
                        error = %err,
                        "Filter callback failed, returning last good value"
                    );
                    break;
                }
            }
        }

        current
    }

    /// Invokes a single registered callback with a freshly built context.
    pub async fn invoke(
        &self,
        entry: &RegisteredCallback,
        scope: &InvocationScope,
        args: &[Value],
    ) -> Result<Value, CallbackError> {
        self.invoke_as(&entry.plugin_id, &entry.callback, scope, args)
            .await
    }

    /// Invokes `callback` on behalf of `plugin_id`.
    ///
    /// Used for lifecycle callbacks, which are not held in the registry.
    pub async fn invoke_as(
        &self,
        plugin_id: &str,
        callback: &Arc<dyn Callback>,
        scope: &InvocationScope,
        args: &[Value],
    ) -> Result<Value, CallbackError> {
        let ctx = self.contexts.build(scope, plugin_id).await?;

        match tokio::time::timeout(self.timeout, callback.invoke(&ctx, args)).await {
            Ok(result) => result,
            Err(_) => Err(CallbackError::Timeout(self.timeout)),
        }
    }
}
