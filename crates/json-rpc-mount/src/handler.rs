use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::codec::ExtValue;
use crate::context::RequestContext;
use crate::failure::HandlerResult;

/// Trait for handling one JSON-RPC method.
///
/// Every handler is invoked with the same three arguments: the transport
/// request context, the endpoint's shared application context, and the
/// decoded `params` (an empty object when the request had none).
#[async_trait]
pub trait JsonRpcHandler<C>: Send + Sync {
    async fn handle(
        &self,
        request: RequestContext,
        context: Arc<C>,
        params: ExtValue,
    ) -> HandlerResult;
}

/// Handler backed by an async closure
pub struct FunctionHandler<C, F, Fut, R> {
    handler_fn: F,
    _marker: PhantomData<fn(Arc<C>) -> (Fut, R)>,
}

impl<C, F, Fut, R> FunctionHandler<C, F, Fut, R>
where
    C: Send + Sync + 'static,
    F: Fn(RequestContext, Arc<C>, ExtValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    R: Into<ExtValue> + 'static,
{
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, F, Fut, R> JsonRpcHandler<C> for FunctionHandler<C, F, Fut, R>
where
    C: Send + Sync + 'static,
    F: Fn(RequestContext, Arc<C>, ExtValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<R>> + Send + 'static,
    R: Into<ExtValue> + 'static,
{
    async fn handle(
        &self,
        request: RequestContext,
        context: Arc<C>,
        params: ExtValue,
    ) -> HandlerResult {
        (self.handler_fn)(request, context, params)
            .await
            .map(Into::into)
    }
}

/// Handler backed by a plain closure; its return value is lifted into a
/// completed future
pub struct SyncFunctionHandler<C, F, R> {
    handler_fn: F,
    _marker: PhantomData<fn(Arc<C>) -> R>,
}

impl<C, F, R> SyncFunctionHandler<C, F, R>
where
    C: Send + Sync + 'static,
    F: Fn(&RequestContext, &C, ExtValue) -> HandlerResult<R> + Send + Sync + 'static,
    R: Into<ExtValue> + 'static,
{
    pub fn new(handler_fn: F) -> Self {
        Self {
            handler_fn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, F, R> JsonRpcHandler<C> for SyncFunctionHandler<C, F, R>
where
    C: Send + Sync + 'static,
    F: Fn(&RequestContext, &C, ExtValue) -> HandlerResult<R> + Send + Sync + 'static,
    R: Into<ExtValue> + 'static,
{
    async fn handle(
        &self,
        request: RequestContext,
        context: Arc<C>,
        params: ExtValue,
    ) -> HandlerResult {
        (self.handler_fn)(&request, &context, params).map(Into::into)
    }
}
