//! The callback trait plugins implement, plus closure adapters.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::api::context::PluginContext;
use crate::error::CallbackError;

/// A unit of plugin code bound to an extension point.
///
/// Actions receive the dispatch arguments and their return value is
/// ignored. Filters receive the current value as `args[0]` followed by the
/// extra arguments and return the next value. Route handlers receive the
/// serialized bridge request and return a response value.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Runs the callback.
    async fn invoke(&self, ctx: &PluginContext, args: &[Value]) -> Result<Value, CallbackError>;
}

type Handler = dyn Fn(PluginContext, Vec<Value>) -> BoxFuture<'static, Result<Value, CallbackError>>
    + Send
    + Sync;

/// A closure-based callback.
pub struct FnCallback {
    handler: Box<Handler>,
}

impl FnCallback {
    /// Wraps an async closure receiving an owned context and arguments.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(PluginContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallbackError>> + Send + 'static,
    {
        Self {
            handler: Box::new(move |ctx, args| Box::pin(f(ctx, args))),
        }
    }
}

impl fmt::Debug for FnCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback").finish_non_exhaustive()
    }
}

#[async_trait]
impl Callback for FnCallback {
    async fn invoke(&self, ctx: &PluginContext, args: &[Value]) -> Result<Value, CallbackError> {
        (self.handler)(ctx.clone(), args.to_vec()).await
    }
}

/// Builds an action callback from a closure that returns nothing.
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn Callback>
where
    F: Fn(PluginContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    Arc::new(FnCallback::new(move |ctx, args| {
        let fut = f(ctx, args);
        async move { fut.await.map(|()| Value::Null) }
    }))
}

/// Builds a callback whose return value matters (route handlers).
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Callback>
where
    F: Fn(PluginContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CallbackError>> + Send + 'static,
{
    Arc::new(FnCallback::new(f))
}

/// Builds a filter callback from a closure taking `(ctx, value, extra_args)`.
pub fn filter_fn<F, Fut>(f: F) -> Arc<dyn Callback>
where
    F: Fn(PluginContext, Value, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CallbackError>> + Send + 'static,
{
    Arc::new(FnCallback::new(move |ctx, mut args| {
        let value = if args.is_empty() {
            Value::Null
        } else {
            args.remove(0)
        };
        f(ctx, value, args)
    }))
}

/// Builds an `on_activate` / `on_deactivate` callback.
pub fn lifecycle_fn<F, Fut>(f: F) -> Arc<dyn Callback>
where
    F: Fn(PluginContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
{
    Arc::new(FnCallback::new(move |ctx, _args| {
        let fut = f(ctx);
        async move { fut.await.map(|()| Value::Null) }
    }))
}
