//! Handler Errors and Parameter Projection
//!
//! Every handler receives the raw parameter mapping and is responsible for
//! validating it. [`parse`] projects the mapping into a typed struct so that a
//! handler can declare its arguments with serde and get a descriptive error
//! on mismatch.

use crate::protocol::Params;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by command handlers.
///
/// The display text of the error is exactly what the client sees in the
/// `message` field of the error response.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The parameters do not fit the handler's expected arguments
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A named entity the command refers to does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The handler ran but could not complete
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        HandlerError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Failed(format!("{:#}", err))
    }
}

/// Projects a parameter mapping into the handler's typed arguments.
///
/// # Example
///
/// ```
/// use scenebridge::commands::params;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct DeleteArgs {
///     name: String,
/// }
///
/// let raw = json!({"name": "Cube"}).as_object().cloned().unwrap();
/// let args: DeleteArgs = params::parse(raw).unwrap();
/// assert_eq!(args.name, "Cube");
/// ```
pub fn parse<T: DeserializeOwned>(params: Params) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| HandlerError::InvalidParams(e.to_string()))
}
