//! Common re-exports for handler authors and transports.
//!
//! ```rust
//! use json_rpc_mount::prelude::*;
//! ```

pub use crate::codec::{ExtMap, ExtValue};
pub use crate::context::RequestContext;
pub use crate::dispatch::{EndpointConfig, JsonRpcEndpoint, JsonRpcEndpointBuilder};
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::failure::{HandlerError, HandlerResult};
pub use crate::handler::JsonRpcHandler;
pub use crate::request::JsonRpcRequest;
pub use crate::response::JsonRpcMessage;
pub use crate::types::RequestId;

pub use crate::error_codes::*;
