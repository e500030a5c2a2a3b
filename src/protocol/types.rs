//! Wire Document Types
//!
//! This module defines the two documents exchanged on the wire.
//!
//! ## Request
//!
//! ```text
//! { "type": "<command name>", "params": { ... } }
//! ```
//!
//! `params` is optional; a missing or `null` value is treated as an empty
//! mapping.
//!
//! ## Response
//!
//! ```text
//! { "status": "success", "result": <any> }
//! { "status": "error", "message": "<string>" }
//! ```
//!
//! Exactly one of `result` / `message` is present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The untyped parameter mapping carried by a command.
///
/// Handlers receive it opaquely and project it into their own typed
/// arguments (see [`crate::commands::params`]).
pub type Params = Map<String, Value>;

/// A named request with a parameter mapping, sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The command name (`type` on the wire)
    pub name: String,
    /// The parameter mapping (`params` on the wire)
    pub params: Params,
}

/// A JSON document that parsed cleanly but is not a command.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// The top-level document is not an object
    #[error("Invalid command: expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The `type` field is missing or not a string
    #[error("Invalid command: missing or non-string 'type' field")]
    MissingType,

    /// The `params` field is present but not an object
    #[error("Invalid command: 'params' must be an object, got {0}")]
    InvalidParams(&'static str),
}

impl Command {
    /// Creates a command with the given name and parameters.
    pub fn new(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Creates a command with no parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Params::new())
    }

    /// Projects a parsed request document into a command.
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(CommandError::NotAnObject(value_kind(&other))),
        };

        let name = match object.remove("type") {
            Some(Value::String(name)) => name,
            _ => return Err(CommandError::MissingType),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(params)) => params,
            Some(other) => return Err(CommandError::InvalidParams(value_kind(&other))),
        };

        Ok(Self { name, params })
    }

    /// Serializes this command as a request document.
    pub fn to_json(&self) -> Vec<u8> {
        let document = serde_json::json!({
            "type": self.name,
            "params": self.params,
        });
        document.to_string().into_bytes()
    }
}

/// The success/error result returned for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// The handler ran and produced a value
    Success { result: Value },
    /// The command was rejected or the handler failed
    Error { message: String },
}

impl Response {
    pub fn success(result: Value) -> Self {
        Response::Success { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// Serializes the response as one newline-terminated document.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            // Only reachable for non-string map keys, which `Value` cannot hold.
            Err(e) => format!(
                r#"{{"status":"error","message":"Failed to serialize response: {}"}}"#,
                e.to_string().replace('"', "'")
            )
            .into_bytes(),
        };
        bytes.push(b'\n');
        bytes
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Success { result } => write!(f, "success: {}", result),
            Response::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// Short name of a JSON value's kind, for error messages.
fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
