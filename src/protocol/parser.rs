//! Incremental JSON Frame Parser
//!
//! Requests carry no length prefix: a message ends where the JSON document
//! ends. The parser looks at the start of an accumulating buffer and returns
//! either:
//! - `Ok(Some((value, consumed)))` - A complete document, `consumed` bytes were used
//! - `Ok(None)` - The buffer holds only a prefix of a document, wait for more data
//! - `Err(ParseError)` - The bytes can never become a valid document
//!
//! The caller advances its buffer by exactly `consumed`, so a second document
//! that arrived in the same read stays buffered for the next call.
//!
//! Incomplete and invalid input are told apart by the error category the JSON
//! reader reports: running out of input mid-document is an EOF error, anything
//! else is a syntax or data error.
//!
//! The JSON reader cannot resume, so an incomplete document is rescanned from
//! its first byte on every call. Input trickled in small reads therefore
//! costs quadratic work in the document size, which `max_frame_size` bounds.
//! Callers should drop leading whitespace with [`leading_whitespace`] so
//! that blank input never accumulates toward the limit.

use serde_json::{Deserializer, Value};
use thiserror::Error;

/// Errors that can occur during framing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The buffered bytes are not, and cannot become, a JSON document
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The buffered document exceeds the maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Default maximum size of a single buffered request (1 MiB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Extracts complete JSON documents from the front of a byte buffer.
///
/// # Example
///
/// ```
/// use scenebridge::protocol::FrameParser;
///
/// let parser = FrameParser::new();
/// let buf = br#"{"type":"a"}{"type":"b"}"#;
///
/// let (first, consumed) = parser.parse(buf).unwrap().unwrap();
/// assert_eq!(first["type"], "a");
///
/// let (second, _) = parser.parse(&buf[consumed..]).unwrap().unwrap();
/// assert_eq!(second["type"], "b");
/// ```
#[derive(Debug, Clone)]
pub struct FrameParser {
    max_frame_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Creates a parser with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Creates a parser that gives up on an incomplete document once more
    /// than `max_frame_size` bytes are buffered.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Attempts to parse one document from the start of `buf`.
    ///
    /// Leading whitespace is skipped and counted as consumed. A buffer that
    /// holds nothing but whitespace is reported as incomplete.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Value, usize)>> {
        let mut stream = Deserializer::from_slice(buf).into_iter::<Value>();

        match stream.next() {
            None => {
                self.check_size(buf)?;
                Ok(None)
            }
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                Ok(Some((value, consumed)))
            }
            Some(Err(e)) if e.is_eof() => {
                self.check_size(buf)?;
                Ok(None)
            }
            Some(Err(e)) => Err(ParseError::InvalidJson(e.to_string())),
        }
    }

    /// Fails once an incomplete buffer has outgrown the frame limit.
    fn check_size(&self, buf: &[u8]) -> ParseResult<()> {
        if buf.len() > self.max_frame_size {
            return Err(ParseError::MessageTooLarge {
                size: buf.len(),
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

/// Number of JSON whitespace bytes at the start of `buf`.
///
/// Only the four bytes JSON treats as whitespace are counted.
pub fn leading_whitespace(buf: &[u8]) -> usize {
    buf.iter()
        .take_while(|&&b| matches!(b, b' ' | b'\n' | b'\t' | b'\r'))
        .count()
}

/// Helper function to parse a single document from bytes.
///
/// This is a convenience function for simple use cases.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(Value, usize)>> {
    FrameParser::new().parse(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_complete_document() {
        let input = br#"{"type":"echo","params":{"x":1}}"#;
        let (value, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(value, json!({"type": "echo", "params": {"x": 1}}));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_incomplete_document() {
        assert!(parse_frame(br#"{"type":"ec"#).unwrap().is_none());
        assert!(parse_frame(br#"{"type":"echo","params":{"#).unwrap().is_none());
        assert!(parse_frame(b"{").unwrap().is_none());
    }

    #[test]
    fn test_parse_empty_and_whitespace() {
        assert!(parse_frame(b"").unwrap().is_none());
        assert!(parse_frame(b"  \n\t ").unwrap().is_none());
    }

    #[test]
    fn test_parse_concatenated_documents() {
        let input = br#"{"type":"a"}{"type":"b","params":{}}"#;
        let (first, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(first, json!({"type": "a"}));
        assert_eq!(consumed, 12);

        let rest = &input[consumed..];
        let (second, consumed) = parse_frame(rest).unwrap().unwrap();
        assert_eq!(second, json!({"type": "b", "params": {}}));
        assert_eq!(consumed, rest.len());
    }

    #[test]
    fn test_parse_retains_partial_second_document() {
        let input = br#"{"type":"a"}{"type":"#;
        let (_, consumed) = parse_frame(input).unwrap().unwrap();
        assert_eq!(&input[consumed..], br#"{"type":"#);
        assert!(parse_frame(&input[consumed..]).unwrap().is_none());
    }

    #[test]
    fn test_parse_newline_delimited() {
        let input = b"{\"type\":\"a\"}\n{\"type\":\"b\"}\n";
        let (_, consumed) = parse_frame(input).unwrap().unwrap();
        let (second, _) = parse_frame(&input[consumed..]).unwrap().unwrap();
        assert_eq!(second, json!({"type": "b"}));
    }

    #[test]
    fn test_parse_byte_by_byte() {
        let input = br#"{"type":"echo","params":{"text":"hi"}}"#;
        for end in 1..input.len() {
            assert!(
                parse_frame(&input[..end]).unwrap().is_none(),
                "prefix of {} bytes parsed early",
                end
            );
        }
        assert!(parse_frame(input).unwrap().is_some());
    }

    #[test]
    fn test_parse_invalid_document() {
        let result = parse_frame(b"{\"type\" \"echo\"}");
        assert!(matches!(result, Err(ParseError::InvalidJson(_))));

        let result = parse_frame(b"hello");
        assert!(matches!(result, Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_parse_oversized_whitespace() {
        let parser = FrameParser::with_max_frame_size(16);
        assert_eq!(
            parser.parse(&[b' '; 4096]),
            Err(ParseError::MessageTooLarge {
                size: 4096,
                max: 16
            })
        );
        assert_eq!(parser.parse(&[b'\n'; 16]), Ok(None));
    }

    #[test]
    fn test_leading_whitespace() {
        assert_eq!(leading_whitespace(b" \r\n\t{\"type\":\"a\"}"), 4);
        assert_eq!(leading_whitespace(b"{}"), 0);
        assert_eq!(leading_whitespace(b"   "), 3);
        // Form feed is not JSON whitespace
        assert_eq!(leading_whitespace(b"\x0c{}"), 0);
    }

    #[test]
    fn test_parse_oversized_incomplete_document() {
        let parser = FrameParser::with_max_frame_size(16);
        let input = br#"{"type":"echo","params":{"padding":"#;
        assert_eq!(
            parser.parse(input),
            Err(ParseError::MessageTooLarge {
                size: input.len(),
                max: 16
            })
        );
    }
}
