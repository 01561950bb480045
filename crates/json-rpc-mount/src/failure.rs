//! Handler failure values
//!
//! A handler fails with a [`HandlerError`]: a structured error (optionally
//! wrapping the error that caused it), a plain data object, or any other
//! JSON value. Any `std::error::Error` converts into one with `?`, with its
//! `source()` chain becoming the chain of causes.

use std::any::Any;
use std::fmt;

use serde_json::{Map, Value};

/// Diagnostic fields of a structured error.
///
/// The names follow the usual system-call error vocabulary (`errno`,
/// `syscall`, `path`, `address`, ...) so errors raised by low-level IO can be
/// reported with the same shape as application errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorFields {
    pub name: Option<String>,
    pub message: Option<String>,
    pub stack: Option<String>,
    /// Numeric codes are used as the JSON-RPC error code; string codes are
    /// diagnostic only
    pub code: Option<Value>,
    pub errno: Option<i64>,
    pub syscall: Option<String>,
    pub hostname: Option<String>,
    pub path: Option<String>,
    pub dest: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    /// The error this one wraps
    pub cause: Option<Box<HandlerError>>,
}

/// Failure raised by a method handler
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerError {
    /// A structured error; chained when `cause` is set
    Error(ErrorFields),
    /// A plain data object raised as the failure
    Object(Map<String, Value>),
    /// Any other raised value
    Other(Value),
}

impl HandlerError {
    /// Error with a message
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError::Error(ErrorFields {
            message: Some(message.into()),
            ..Default::default()
        })
    }

    /// Error with a message and a numeric code reported to the caller
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self::new(message).code(code)
    }

    /// Error that wraps a causal predecessor
    pub fn wrap(cause: HandlerError, message: impl Into<String>) -> Self {
        Self::new(message).caused_by(cause)
    }

    pub fn object(fields: Map<String, Value>) -> Self {
        HandlerError::Object(fields)
    }

    pub fn other(value: impl Into<Value>) -> Self {
        HandlerError::Other(value.into())
    }

    /// Build from any error, following its `source()` chain
    pub fn from_std_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut fields = ErrorFields {
            message: Some(err.to_string()),
            ..Default::default()
        };
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            fields.errno = io.raw_os_error().map(i64::from);
            fields.code = Some(Value::String(format!("{:?}", io.kind())));
            fields.name = Some("IoError".to_string());
        }
        fields.cause = err
            .source()
            .map(|source| Box::new(Self::from_std_error(source)));
        HandlerError::Error(fields)
    }

    /// Build from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        HandlerError::Error(ErrorFields {
            name: Some("Panic".to_string()),
            message,
            ..Default::default()
        })
    }

    fn map_fields(self, f: impl FnOnce(&mut ErrorFields)) -> Self {
        match self {
            HandlerError::Error(mut fields) => {
                f(&mut fields);
                HandlerError::Error(fields)
            }
            other => other,
        }
    }

    /// Set the code of a structured error (no-op for other kinds)
    pub fn code(self, code: impl Into<Value>) -> Self {
        let code = code.into();
        self.map_fields(|fields| fields.code = Some(code))
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.map_fields(|fields| fields.name = Some(name))
    }

    pub fn stack(self, stack: impl Into<String>) -> Self {
        let stack = stack.into();
        self.map_fields(|fields| fields.stack = Some(stack))
    }

    pub fn caused_by(self, cause: HandlerError) -> Self {
        self.map_fields(|fields| fields.cause = Some(Box::new(cause)))
    }

    /// Fill in the system-call diagnostics of a structured error
    pub fn syscall(self, syscall: impl Into<String>, errno: i64) -> Self {
        let syscall = syscall.into();
        self.map_fields(|fields| {
            fields.syscall = Some(syscall);
            fields.errno = Some(errno);
        })
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.map_fields(|fields| fields.path = Some(path))
    }

    pub fn address(self, address: impl Into<String>, port: Option<u16>) -> Self {
        let address = address.into();
        self.map_fields(|fields| {
            fields.address = Some(address);
            fields.port = port;
        })
    }

    /// Numeric code carried by the failure itself, if any
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            HandlerError::Error(fields) => fields.code.as_ref().and_then(Value::as_i64),
            HandlerError::Object(map) => map.get("code").and_then(Value::as_i64),
            HandlerError::Other(_) => None,
        }
    }

    /// Message carried by the failure itself, if any. An empty message is
    /// still a message.
    pub fn rpc_message(&self) -> Option<&str> {
        match self {
            HandlerError::Error(fields) => fields.message.as_deref(),
            HandlerError::Object(map) => map.get("message").and_then(Value::as_str),
            HandlerError::Other(_) => None,
        }
    }

    pub fn cause(&self) -> Option<&HandlerError> {
        match self {
            HandlerError::Error(fields) => fields.cause.as_deref(),
            _ => None,
        }
    }

    pub fn is_chained(&self) -> bool {
        self.cause().is_some()
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Error(fields) => {
                write!(f, "{}", fields.message.as_deref().unwrap_or("Internal error"))?;
                if let Some(cause) = &fields.cause {
                    write!(f, ": {}", cause)?;
                }
                Ok(())
            }
            HandlerError::Object(map) => write!(f, "{}", Value::Object(map.clone())),
            HandlerError::Other(value) => write!(f, "{}", value),
        }
    }
}

// HandlerError must not implement std::error::Error: this blanket
// conversion would overlap `impl<T> From<T> for T`.
impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        let converted = HandlerError::from_std_error(&err);
        let unnamed =
            matches!(&converted, HandlerError::Error(fields) if fields.name.is_none());
        if unnamed {
            let full = std::any::type_name::<E>();
            converted.name(full.rsplit("::").next().unwrap_or(full))
        } else {
            converted
        }
    }
}

/// Result type returned by method handlers
pub type HandlerResult<T = crate::codec::ExtValue> = Result<T, HandlerError>;
