//! # HTTP JSON-RPC Mount
//!
//! Serves a [`json_rpc_mount::JsonRpcEndpoint`] over HTTP/1.1 with hyper.
//! One path accepts `POST` requests carrying JSON; the endpoint's response
//! envelope is returned with status 200, including for JSON-RPC level errors.
//!
//! ## Features
//! - Content-type and body-size checks before parsing
//! - `-32700` envelopes for bodies that are not JSON
//! - CORS headers and preflight handling
//! - Request metadata (method, path, headers, peer address) passed to handlers

pub mod cors;
pub mod handler;
pub mod server;

#[cfg(test)]
mod tests;

// Re-export main types
pub use cors::CorsLayer;
pub use handler::JsonRpcHttpHandler;
pub use server::{HttpJsonRpcServer, HttpJsonRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use json_rpc_mount::{JsonRpcEndpoint, JsonRpcHandler};

/// Result type for HTTP mount operations
pub type Result<T> = std::result::Result<T, HttpMountError>;

/// HTTP mount errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
