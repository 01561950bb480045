use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject, JsonRpcTransportError};
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    /// Serialized as `null` for notifications
    pub id: Option<RequestId>,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: Option<RequestId>, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }
}

/// Either a success or an error envelope.
///
/// The two shapes are distinct types so an envelope can never carry both
/// `result` and `error`, or neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Error response with error field. Listed first: a missing `result`
    /// would otherwise deserialize as `null`.
    Error(JsonRpcError),
    /// Successful response with result field
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Assemble the final envelope for a request.
    ///
    /// `result` must already be wire-encoded; nothing here transforms it.
    pub fn build(id: Option<RequestId>, outcome: Result<Value, JsonRpcErrorObject>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::Error(JsonRpcError::new(id, error)),
        }
    }

    /// Create a success message
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    /// Create an error message
    pub fn error(error: JsonRpcError) -> Self {
        Self::Error(error)
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error(_))
    }

    /// Request id echoed by this envelope, if any
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Response(resp) => resp.id.as_ref(),
            JsonRpcMessage::Error(err) => err.id.as_ref(),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            JsonRpcMessage::Response(resp) => Some(&resp.result),
            JsonRpcMessage::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            JsonRpcMessage::Response(_) => None,
            JsonRpcMessage::Error(err) => Some(&err.error),
        }
    }

    /// Serialize to the JSON text sent back to the caller
    pub fn to_json_string(&self) -> Result<String, JsonRpcTransportError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::error::JsonRpcErrorCode;

    #[test]
    fn test_build_success() {
        let message = JsonRpcMessage::build(Some(RequestId::from(1)), Ok(json!(5)));
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": 5})
        );
    }

    #[test]
    fn test_build_error_without_id() {
        let message = JsonRpcMessage::build(
            None,
            Err(JsonRpcErrorObject::new(JsonRpcErrorCode::InternalError, None, None)),
        );
        let value = serde_json::to_value(&message).unwrap();

        assert!(message.is_error());
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["message"], "Internal error");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_null_result_is_kept() {
        let message = JsonRpcMessage::build(Some(RequestId::from("a")), Ok(Value::Null));
        let value = serde_json::to_value(&message).unwrap();

        let object = value.as_object().unwrap();
        assert!(object.contains_key("result"));
        assert!(!object.contains_key("error"));
    }

    #[test]
    fn test_round_trip_through_text() {
        let message = JsonRpcMessage::build(Some(RequestId::from(9)), Ok(json!({"ok": true})));
        let text = message.to_json_string().unwrap();
        let parsed: JsonRpcMessage = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed.id(), Some(&RequestId::from(9)));
        assert_eq!(parsed.result(), Some(&json!({"ok": true})));
    }

    #[test]
    fn test_error_envelope_parses_as_error() {
        let text = r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"Method \"m\" not found"}}"#;
        let parsed: JsonRpcMessage = serde_json::from_str(text).unwrap();

        assert!(parsed.is_error());
        assert_eq!(parsed.error_object().map(|e| e.code), Some(-32601));
        assert_eq!(parsed.result(), None);
    }
}
