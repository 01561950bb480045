use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::codec::{ExtValue, decode, encode};
use crate::context::RequestContext;
use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
use crate::failure::{HandlerError, HandlerResult};
use crate::handler::JsonRpcHandler;
use crate::normalize::normalize;
use crate::registry::MethodRegistry;
use crate::request::{ValidationResult, parse_body, validate};
use crate::response::JsonRpcMessage;

/// Message of the failure raised when a handler exceeds
/// [`EndpointConfig::handler_timeout`]
pub const HANDLER_TIMEOUT_MESSAGE: &str = "Handler timed out";

/// Configuration for a [`JsonRpcEndpoint`]
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Upper bound on a single handler call. `None` (the default) waits
    /// indefinitely.
    pub handler_timeout: Option<Duration>,
    /// Drop location-revealing fields from `error.data`
    pub sanitize_error_data: bool,
    /// Attach the normalized failure as `error.data`
    pub include_error_data: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            handler_timeout: None,
            sanitize_error_data: true,
            include_error_data: true,
        }
    }
}

/// JSON-RPC endpoint: method registry, shared application context and the
/// dispatch pipeline.
///
/// Every call produces exactly one [`JsonRpcMessage`]. Handler errors,
/// handler panics and timeouts all become error envelopes; nothing unwinds
/// out of [`dispatch`](Self::dispatch).
pub struct JsonRpcEndpoint<C> {
    config: EndpointConfig,
    registry: MethodRegistry<C>,
    context: Arc<C>,
}

impl<C> JsonRpcEndpoint<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(context: C) -> Self {
        Self::with_shared_context(Arc::new(context))
    }

    /// Create an endpoint around a context the application also holds
    pub fn with_shared_context(context: Arc<C>) -> Self {
        Self {
            config: EndpointConfig::default(),
            registry: MethodRegistry::new(),
            context,
        }
    }

    pub fn builder(context: C) -> JsonRpcEndpointBuilder<C> {
        JsonRpcEndpointBuilder::new(context)
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn registry(&self) -> &MethodRegistry<C> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MethodRegistry<C> {
        &mut self.registry
    }

    /// Register a handler for a method (last registration wins)
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<C> + 'static,
    {
        self.registry.register(name, handler);
    }

    /// Register an async closure for a method
    pub fn register_fn<F, Fut, R>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(RequestContext, Arc<C>, ExtValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.registry.register_fn(name, handler_fn);
    }

    /// Register a synchronous closure for a method
    pub fn register_sync<F, R>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(&RequestContext, &C, ExtValue) -> HandlerResult<R> + Send + Sync + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.registry.register_sync(name, handler_fn);
    }

    /// Process raw request text. Text that is not JSON yields a `-32700`
    /// envelope with a null id.
    pub async fn handle_str(&self, request: RequestContext, body: &str) -> JsonRpcMessage {
        match parse_body(body.as_bytes()) {
            Ok(value) => self.handle_value(request, value).await,
            Err(err) => {
                warn!("JSON-RPC parse error: {}", err);
                JsonRpcMessage::error(JsonRpcError::parse_error())
            }
        }
    }

    /// Validate and dispatch a parsed request body
    pub async fn handle_value(&self, request: RequestContext, body: Value) -> JsonRpcMessage {
        self.dispatch(request, validate(body)).await
    }

    /// Dispatch a validated envelope to its handler
    pub async fn dispatch(
        &self,
        request: RequestContext,
        validated: ValidationResult,
    ) -> JsonRpcMessage {
        let call = match validated {
            ValidationResult::Valid(call) => call,
            ValidationResult::Invalid { id, message, .. } => {
                warn!("Rejected JSON-RPC envelope: {}", message);
                return JsonRpcMessage::error(JsonRpcError::invalid_request(id, message));
            }
        };

        let Some(handler) = self.registry.lookup(&call.method) else {
            warn!("Method not found: {}", call.method);
            return JsonRpcMessage::error(JsonRpcError::method_not_found(call.id, &call.method));
        };

        debug!(
            "Dispatching JSON-RPC request: method={}, id={:?}",
            call.method, call.id
        );

        let outcome = match self.invoke(handler, request, decode(call.params)).await {
            Ok(result) => Ok(encode(&result)),
            Err(failure) => {
                warn!("Handler for {} failed: {}", call.method, failure);
                Err(self.to_error_object(&failure))
            }
        };

        JsonRpcMessage::build(call.id, outcome)
    }

    /// Run one handler call to completion, converting panics (at call time
    /// or while polling) and timeouts into failures.
    async fn invoke(
        &self,
        handler: Arc<dyn JsonRpcHandler<C>>,
        request: RequestContext,
        params: ExtValue,
    ) -> HandlerResult {
        let context = Arc::clone(&self.context);
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| {
            handler.handle(request, context, params)
        }));
        let future = match started {
            Ok(future) => future,
            Err(payload) => {
                error!("Handler panicked before returning a future");
                return Err(HandlerError::from_panic(payload));
            }
        };

        let guarded = AssertUnwindSafe(future).catch_unwind();
        let polled = match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(polled) => polled,
                Err(_) => {
                    error!("Handler exceeded timeout of {:?}", limit);
                    return Err(HandlerError::new(HANDLER_TIMEOUT_MESSAGE));
                }
            },
            None => guarded.await,
        };

        polled.unwrap_or_else(|payload| {
            error!("Handler panicked");
            Err(HandlerError::from_panic(payload))
        })
    }

    fn to_error_object(&self, failure: &HandlerError) -> JsonRpcErrorObject {
        let code = failure
            .rpc_code()
            .unwrap_or(crate::error_codes::INTERNAL_ERROR);
        let message = failure
            .rpc_message()
            .map(str::to_string)
            .unwrap_or_else(|| JsonRpcErrorCode::InternalError.message().to_string());
        let data = self
            .config
            .include_error_data
            .then(|| normalize(failure, self.config.sanitize_error_data));

        JsonRpcErrorObject {
            code,
            message,
            data,
        }
    }
}

/// Builder for [`JsonRpcEndpoint`]
pub struct JsonRpcEndpointBuilder<C> {
    config: EndpointConfig,
    registry: MethodRegistry<C>,
    context: Arc<C>,
}

impl<C> JsonRpcEndpointBuilder<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(context: C) -> Self {
        Self::with_shared_context(Arc::new(context))
    }

    pub fn with_shared_context(context: Arc<C>) -> Self {
        Self {
            config: EndpointConfig::default(),
            registry: MethodRegistry::new(),
            context,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Fail handler calls that run longer than `limit`
    pub fn handler_timeout(mut self, limit: Duration) -> Self {
        self.config.handler_timeout = Some(limit);
        self
    }

    pub fn sanitize_error_data(mut self, sanitize: bool) -> Self {
        self.config.sanitize_error_data = sanitize;
        self
    }

    pub fn include_error_data(mut self, include: bool) -> Self {
        self.config.include_error_data = include;
        self
    }

    pub fn method<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: JsonRpcHandler<C> + 'static,
    {
        self.registry.register(name, handler);
        self
    }

    pub fn method_fn<F, Fut, R>(mut self, name: impl Into<String>, handler_fn: F) -> Self
    where
        F: Fn(RequestContext, Arc<C>, ExtValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.registry.register_fn(name, handler_fn);
        self
    }

    pub fn method_sync<F, R>(mut self, name: impl Into<String>, handler_fn: F) -> Self
    where
        F: Fn(&RequestContext, &C, ExtValue) -> HandlerResult<R> + Send + Sync + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.registry.register_sync(name, handler_fn);
        self
    }

    pub fn build(self) -> JsonRpcEndpoint<C> {
        JsonRpcEndpoint {
            config: self.config,
            registry: self.registry,
            context: self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use num_bigint::BigUint;
    use serde_json::json;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    #[derive(Default)]
    struct AppState {
        calls: AtomicUsize,
    }

    fn add(_req: &RequestContext, _ctx: &AppState, params: ExtValue) -> HandlerResult<i64> {
        let a = params.get("a").and_then(ExtValue::as_i64);
        let b = params.get("b").and_then(ExtValue::as_i64);
        match (a, b) {
            (Some(a), Some(b)) => Ok(a + b),
            _ => Err(HandlerError::with_code(-32602, "'a' and 'b' must be integers")),
        }
    }

    fn endpoint() -> JsonRpcEndpoint<AppState> {
        JsonRpcEndpoint::builder(AppState::default())
            .method_sync("add", add)
            .method_sync("bad", |_req: &RequestContext, _ctx: &AppState, _params: ExtValue| {
                Err::<ExtValue, _>(HandlerError::with_code(400, "bad"))
            })
            .method_fn("later_bad", |_req, _ctx, _params| async {
                tokio::task::yield_now().await;
                Err::<ExtValue, _>(HandlerError::new("failed after await"))
            })
            .method_sync("sync_panic", |_req: &RequestContext, _ctx: &AppState, _params: ExtValue| -> HandlerResult {
                panic!("sync boom")
            })
            .method_fn("async_panic", |_req, _ctx, _params| async {
                tokio::task::yield_now().await;
                if true {
                    panic!("async boom");
                }
                Ok(ExtValue::Null)
            })
            .method_fn("count", |_req, ctx: Arc<AppState>, _params| async move {
                Ok(ctx.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1)
            })
            .method_sync("next", |_req: &RequestContext, _ctx: &AppState, params: ExtValue| {
                let n = params
                    .get("n")
                    .and_then(ExtValue::to_bigint)
                    .ok_or_else(|| HandlerError::new("'n' must be an integer"))?;
                Ok(n + BigUint::from(1u8))
            })
            .method_sync("epoch", |_req: &RequestContext, _ctx: &AppState, _params: ExtValue| {
                Ok::<_, HandlerError>(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())
            })
            .build()
    }

    async fn call(endpoint: &JsonRpcEndpoint<AppState>, body: Value) -> Value {
        let message = endpoint.handle_value(RequestContext::default(), body).await;
        serde_json::to_value(message).unwrap()
    }

    #[tokio::test]
    async fn test_add_scenario() {
        let response = call(
            &endpoint(),
            json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 2, "b": 3}, "id": 1}),
        )
        .await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 1, "result": 5}));
    }

    #[tokio::test]
    async fn test_unknown_method_scenario() {
        let response = call(
            &endpoint(),
            json!({"jsonrpc": "2.0", "method": "noSuchMethod", "id": "x"}),
        )
        .await;
        assert_eq!(
            response,
            json!({
                "jsonrpc": "2.0",
                "id": "x",
                "error": {"code": -32601, "message": "Method \"noSuchMethod\" not found"}
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_envelopes() {
        let endpoint = endpoint();

        let response = call(&endpoint, json!({"jsonrpc": "1.0", "method": "add", "id": 4})).await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(
            response["error"]["message"],
            "Invalid Request: 'jsonrpc' must be '2.0'."
        );
        assert_eq!(response["id"], 4);

        let response = call(&endpoint, json!({"jsonrpc": "2.0", "method": 17, "id": 5})).await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(
            response["error"]["message"],
            "Invalid Request: 'method' must be a string."
        );

        let response = call(&endpoint, json!([{"jsonrpc": "2.0", "method": "add", "id": 6}])).await;
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_rejected_envelope_is_invalid_request_error() {
        let message = endpoint()
            .handle_value(
                RequestContext::default(),
                json!({"jsonrpc": "2.0", "method": null, "id": "r"}),
            )
            .await;

        let JsonRpcMessage::Error(error) = message else {
            panic!("expected an error envelope");
        };
        assert_eq!(
            error,
            JsonRpcError::invalid_request(
                Some(RequestId::from("r")),
                "Invalid Request: 'method' must be a string."
            )
        );
        assert!(error.error.data.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_keeps_code_and_message() {
        let response = call(&endpoint(), json!({"jsonrpc": "2.0", "method": "bad", "id": 2})).await;
        assert_eq!(response["error"]["code"], 400);
        assert_eq!(response["error"]["message"], "bad");
        assert_eq!(
            response["error"]["data"],
            json!({"message": "bad", "code": 400, "type": "Error"})
        );
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_async_failure_defaults_to_internal_error() {
        let response =
            call(&endpoint(), json!({"jsonrpc": "2.0", "method": "later_bad", "id": 3})).await;
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(response["error"]["message"], "failed after await");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panics_become_error_envelopes() {
        let endpoint = endpoint();

        for method in ["sync_panic", "async_panic"] {
            let response = call(&endpoint, json!({"jsonrpc": "2.0", "method": method, "id": 1})).await;
            assert_eq!(response["error"]["code"], -32603, "method {method}");
            assert_eq!(response["error"]["data"]["name"], "Panic");
        }
        assert!(logs_contain("Handler panicked"));

        // The endpoint keeps serving after a panic.
        let response = call(
            &endpoint,
            json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 1}, "id": 2}),
        )
        .await;
        assert_eq!(response["result"], 2);
    }

    struct EagerPanic;

    impl JsonRpcHandler<AppState> for EagerPanic {
        fn handle<'life0, 'async_trait>(
            &'life0 self,
            _request: RequestContext,
            _context: Arc<AppState>,
            _params: ExtValue,
        ) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + 'async_trait>>
        where
            'life0: 'async_trait,
            Self: 'async_trait,
        {
            panic!("panicked before building a future")
        }
    }

    #[tokio::test]
    async fn test_panic_before_future_is_contained() {
        let mut endpoint = endpoint();
        endpoint.register("eager", EagerPanic);

        let response = call(&endpoint, json!({"jsonrpc": "2.0", "method": "eager", "id": 8})).await;
        assert_eq!(response["error"]["code"], -32603);
        assert_eq!(
            response["error"]["message"],
            "panicked before building a future"
        );
    }

    #[tokio::test]
    async fn test_notification_gets_null_id() {
        let response = call(
            &endpoint(),
            json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 1, "b": 2}}),
        )
        .await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": null, "result": 3}));
    }

    #[tokio::test]
    async fn test_extended_values_cross_the_pipeline() {
        let endpoint = endpoint();

        let response = call(
            &endpoint,
            json!({
                "jsonrpc": "2.0",
                "method": "next",
                "params": {"n": "123456789012345678901234567890"},
                "id": 1
            }),
        )
        .await;
        assert_eq!(response["result"], "123456789012345678901234567891");

        let response = call(&endpoint, json!({"jsonrpc": "2.0", "method": "epoch", "id": 2})).await;
        assert_eq!(response["result"], "2000-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_context_is_shared_across_calls() {
        let endpoint = endpoint();
        for expected in 1..=3u64 {
            let response = call(&endpoint, json!({"jsonrpc": "2.0", "method": "count", "id": 1})).await;
            assert_eq!(response["result"], expected);
        }
        assert_eq!(endpoint.context().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrent_requests_keep_their_ids() {
        let endpoint = Arc::new(endpoint());
        let calls = (0..16i64).map(|i| {
            let endpoint = Arc::clone(&endpoint);
            async move {
                let body = json!({"jsonrpc": "2.0", "method": "add", "params": {"a": i, "b": 1}, "id": i});
                (i, endpoint.handle_value(RequestContext::default(), body).await)
            }
        });

        for (i, message) in futures::future::join_all(calls).await {
            assert_eq!(message.id(), Some(&RequestId::from(i)));
            assert_eq!(message.result(), Some(&json!(i + 1)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_timeout() {
        let endpoint = JsonRpcEndpoint::builder(())
            .handler_timeout(Duration::from_secs(1))
            .method_fn("slow", |_req, _ctx, _params| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ExtValue::from("done"))
            })
            .build();

        let message = endpoint
            .handle_value(
                RequestContext::default(),
                json!({"jsonrpc": "2.0", "method": "slow", "id": 1}),
            )
            .await;
        let error = message.error_object().expect("timeout error");
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, HANDLER_TIMEOUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_error_data_configuration() {
        let endpoint = JsonRpcEndpoint::builder(())
            .include_error_data(false)
            .method_sync("fail", |_req: &RequestContext, _ctx: &(), _params: ExtValue| {
                Err::<ExtValue, _>(HandlerError::other(json!(["raw"])))
            })
            .build();

        let message = endpoint
            .handle_value(
                RequestContext::default(),
                json!({"jsonrpc": "2.0", "method": "fail", "id": 1}),
            )
            .await;
        let error = message.error_object().unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "Internal error");
        assert!(error.data.is_none());
    }

    #[tokio::test]
    async fn test_empty_failure_message_is_sent_as_is() {
        let endpoint = JsonRpcEndpoint::builder(())
            .method_sync("quiet", |_req: &RequestContext, _ctx: &(), _params: ExtValue| {
                Err::<ExtValue, _>(HandlerError::new(""))
            })
            .method_sync("wordless", |_req: &RequestContext, _ctx: &(), _params: ExtValue| {
                Err::<ExtValue, _>(HandlerError::object(serde_json::Map::new()))
            })
            .build();

        let request = |method: &str| json!({"jsonrpc": "2.0", "method": method, "id": 1});
        let quiet = endpoint
            .handle_value(RequestContext::default(), request("quiet"))
            .await;
        assert_eq!(quiet.error_object().unwrap().message, "");

        let wordless = endpoint
            .handle_value(RequestContext::default(), request("wordless"))
            .await;
        assert_eq!(wordless.error_object().unwrap().message, "Internal error");
    }

    #[tokio::test]
    async fn test_unsanitized_error_data() {
        let endpoint = JsonRpcEndpoint::builder(())
            .sanitize_error_data(false)
            .method_sync("open", |_req: &RequestContext, _ctx: &(), _params: ExtValue| {
                Err::<ExtValue, _>(HandlerError::new("open failed").path("/srv/data"))
            })
            .build();

        let message = endpoint
            .handle_value(
                RequestContext::default(),
                json!({"jsonrpc": "2.0", "method": "open", "id": 1}),
            )
            .await;
        let data = message.error_object().and_then(|e| e.data.clone()).unwrap();
        assert_eq!(data["path"], "/srv/data");
    }

    #[tokio::test]
    async fn test_handle_str_parse_error() {
        let message = endpoint()
            .handle_str(RequestContext::default(), r#"{"jsonrpc": "2.0", "method""#)
            .await;
        assert_eq!(message.id(), None);
        assert_eq!(message.error_object().map(|e| e.code), Some(-32700));

        let message = endpoint()
            .handle_str(
                RequestContext::default(),
                r#"{"jsonrpc": "2.0", "method": "add", "params": {"a": 4, "b": 4}, "id": 7}"#,
            )
            .await;
        assert_eq!(message.result(), Some(&json!(8)));
    }
}
