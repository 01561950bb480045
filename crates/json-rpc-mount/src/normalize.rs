//! Conversion of handler failures into JSON-safe error snapshots.
//!
//! A snapshot is what travels in `error.data`. It only ever contains the
//! allow-listed diagnostic fields below, so whatever a handler raises the
//! caller sees a bounded tree of plain JSON.

use serde_json::{Map, Value};

use crate::failure::{ErrorFields, HandlerError};

/// Diagnostic fields copied from structured errors, in output order
pub const ALLOWED_FIELDS: &[&str] = &[
    "name", "message", "stack", "code", "errno", "syscall", "hostname", "path", "dest", "address",
    "port",
];

/// Fields dropped when sanitizing: they reveal file-system or network locations
pub const LOCATION_FIELDS: &[&str] = &["hostname", "path", "dest", "address", "port"];

pub const TYPE_ERROR: &str = "Error";
pub const TYPE_NESTED_ERROR: &str = "NestedError";
pub const TYPE_OBJECT: &str = "Object";
pub const TYPE_DEFAULT: &str = "Default";

/// Build the error snapshot for `failure`.
///
/// With `sanitize` set, [`LOCATION_FIELDS`] are excluded at every depth of a
/// chained error.
pub fn normalize(failure: &HandlerError, sanitize: bool) -> Value {
    let mut out = Map::new();
    match failure {
        HandlerError::Error(fields) => {
            copy_allowed(fields, sanitize, &mut out);
            match &fields.cause {
                Some(cause) => {
                    out.insert("nested".to_string(), normalize(cause, sanitize));
                    out.insert("type".to_string(), TYPE_NESTED_ERROR.into());
                }
                None => {
                    out.insert("type".to_string(), TYPE_ERROR.into());
                }
            }
        }
        HandlerError::Object(map) => {
            out.insert("type".to_string(), TYPE_OBJECT.into());
            for (key, value) in map {
                if key == "type" || (sanitize && LOCATION_FIELDS.contains(&key.as_str())) {
                    continue;
                }
                out.insert(key.clone(), value.clone());
            }
        }
        HandlerError::Other(value) => {
            out.insert("type".to_string(), TYPE_DEFAULT.into());
            out.insert("instance".to_string(), value.clone());
        }
    }
    Value::Object(out)
}

fn copy_allowed(fields: &ErrorFields, sanitize: bool, out: &mut Map<String, Value>) {
    for &key in ALLOWED_FIELDS {
        if sanitize && LOCATION_FIELDS.contains(&key) {
            continue;
        }
        if let Some(value) = field_value(fields, key) {
            out.insert(key.to_string(), value);
        }
    }
}

fn field_value(fields: &ErrorFields, key: &str) -> Option<Value> {
    let text = |v: &Option<String>| v.as_ref().map(|s| Value::String(s.clone()));
    match key {
        "name" => text(&fields.name),
        "message" => text(&fields.message),
        "stack" => text(&fields.stack),
        "code" => fields.code.clone(),
        "errno" => fields.errno.map(Value::from),
        "syscall" => text(&fields.syscall),
        "hostname" => text(&fields.hostname),
        "path" => text(&fields.path),
        "dest" => text(&fields.dest),
        "address" => text(&fields.address),
        "port" => fields.port.map(Value::from),
        _ => None,
    }
}
