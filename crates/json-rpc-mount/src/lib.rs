//! # JSON-RPC 2.0 Endpoint
//!
//! A transport-agnostic JSON-RPC 2.0 request handling layer. A transport
//! hands over a parsed body plus a [`RequestContext`]; the endpoint validates
//! the envelope, routes it to a registered handler and always produces exactly
//! one response envelope.
//!
//! ## Features
//! - Method registry with async, sync and trait-object handlers
//! - Envelope validation with fixed `-32600` messages
//! - Panic and timeout containment around every handler call
//! - Lossless codec for big integers and UTC date-times carried as strings
//! - Structured error snapshots in `error.data`, with location fields sanitized
//!
//! ```rust,no_run
//! use json_rpc_mount::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() {
//! let endpoint = JsonRpcEndpoint::builder(())
//!     .method_sync("add", |_req: &RequestContext, _ctx: &(), params: ExtValue| {
//!         let a = params.get("a").and_then(ExtValue::as_i64).unwrap_or(0);
//!         let b = params.get("b").and_then(ExtValue::as_i64).unwrap_or(0);
//!         Ok::<_, HandlerError>(a + b)
//!     })
//!     .build();
//!
//! let body = json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 2, "b": 3}, "id": 1});
//! let response = endpoint.handle_value(RequestContext::default(), body).await;
//! assert_eq!(response.result(), Some(&json!(5)));
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod failure;
pub mod handler;
pub mod normalize;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use codec::{ExtMap, ExtValue, decode, encode};
pub use context::RequestContext;
pub use dispatch::{EndpointConfig, JsonRpcEndpoint, JsonRpcEndpointBuilder};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, JsonRpcTransportError};
pub use failure::{ErrorFields, HandlerError, HandlerResult};
pub use handler::{FunctionHandler, JsonRpcHandler, SyncFunctionHandler};
pub use normalize::normalize;
pub use registry::{MethodEntry, MethodRegistry};
pub use request::{JsonRpcRequest, ValidationResult, parse_body, validate};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}
