use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Per-call view of the transport request a JSON-RPC body arrived on.
///
/// Transports fill in what they know; in-process callers can use
/// [`RequestContext::default`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Transport method, e.g. `POST`
    pub method: Option<String>,
    /// Request path, e.g. `/rpc`
    pub path: Option<String>,
    /// Headers with lower-cased names
    pub headers: HashMap<String, String>,
    /// Remote peer, when the transport exposes it
    pub peer_addr: Option<SocketAddr>,
    /// Free-form values attached by the transport or middleware
    pub metadata: HashMap<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            headers: HashMap::new(),
            peer_addr: None,
            metadata: HashMap::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
