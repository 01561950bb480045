use serde_json::{Map, Value};

use crate::error::JsonRpcTransportError;
use crate::types::RequestId;

pub const INVALID_VERSION_MESSAGE: &str = "Invalid Request: 'jsonrpc' must be '2.0'.";
pub const INVALID_METHOD_MESSAGE: &str = "Invalid Request: 'method' must be a string.";

/// A request envelope that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// `None` for notifications (absent or null id)
    pub id: Option<RequestId>,
    pub method: String,
    /// Raw wire params; an empty object when the envelope had none
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: Option<RequestId>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a request with no parameters
    pub fn new_no_params(id: Option<RequestId>, method: impl Into<String>) -> Self {
        Self::new(id, method, Value::Object(Map::new()))
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Request envelope as sent on the wire
    pub fn to_value(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("jsonrpc".to_string(), crate::JSONRPC_VERSION.into());
        envelope.insert("method".to_string(), self.method.clone().into());
        envelope.insert("params".to_string(), self.params.clone());
        let id = match &self.id {
            Some(RequestId::String(s)) => Value::String(s.clone()),
            Some(RequestId::Number(n)) => Value::Number(n.clone()),
            None => return Value::Object(envelope),
        };
        envelope.insert("id".to_string(), id);
        Value::Object(envelope)
    }
}

/// Outcome of [`validate`]
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid(JsonRpcRequest),
    Invalid {
        id: Option<RequestId>,
        code: i64,
        message: &'static str,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    /// Id to echo, whichever way validation went
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            ValidationResult::Valid(request) => request.id.as_ref(),
            ValidationResult::Invalid { id, .. } => id.as_ref(),
        }
    }
}

/// Check a parsed request body against the envelope rules.
///
/// Rules apply in order and the first failure wins:
/// 1. the body is an object whose `jsonrpc` is exactly `"2.0"`;
/// 2. `method` is a string.
///
/// `params` is not inspected. Arrays (batch requests) fail rule 1.
pub fn validate(raw_body: Value) -> ValidationResult {
    let Value::Object(mut body) = raw_body else {
        return invalid(None, INVALID_VERSION_MESSAGE);
    };

    let id = body.get("id").and_then(RequestId::from_value);

    match body.get("jsonrpc") {
        Some(Value::String(version)) if version == crate::JSONRPC_VERSION => {}
        _ => return invalid(id, INVALID_VERSION_MESSAGE),
    }

    let method = match body.remove("method") {
        Some(Value::String(method)) => method,
        _ => return invalid(id, INVALID_METHOD_MESSAGE),
    };

    let params = body
        .remove("params")
        .unwrap_or_else(|| Value::Object(Map::new()));

    ValidationResult::Valid(JsonRpcRequest { id, method, params })
}

/// Parse raw body bytes into JSON
pub fn parse_body(bytes: &[u8]) -> Result<Value, JsonRpcTransportError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn invalid(id: Option<RequestId>, message: &'static str) -> ValidationResult {
    ValidationResult::Invalid {
        id,
        code: crate::error_codes::INVALID_REQUEST,
        message,
    }
}
