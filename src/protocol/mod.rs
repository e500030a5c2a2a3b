//! Wire Protocol
//!
//! Requests and responses are self-describing JSON documents sent as raw
//! bytes on a stream socket.
//!
//! ## Modules
//!
//! - `types`: Defines `Command`, `Response` and the parameter mapping
//! - `parser`: Incremental parser that finds document boundaries in a byte stream
//!
//! ## Example
//!
//! ```
//! use scenebridge::protocol::{parse_frame, Command, Response};
//! use serde_json::json;
//!
//! // Framing incoming data
//! let data = br#"{"type":"get_scene_info","params":{}}"#;
//! let (value, consumed) = parse_frame(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//! let command = Command::from_value(value).unwrap();
//! assert_eq!(command.name, "get_scene_info");
//!
//! // Creating responses
//! let response = Response::success(json!({"x": 1}));
//! let bytes = response.serialize();
//! assert!(bytes.ends_with(b"\n"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{
    leading_whitespace, parse_frame, FrameParser, ParseError, ParseResult, MAX_FRAME_SIZE,
};
pub use types::{Command, CommandError, Params, Response};
