//! Incremental frame parser for the chat stream
//!
//! Ollama answers `/api/chat` with newline-delimited JSON objects, but HTTP
//! chunks split them at arbitrary byte offsets. The parser buffers bytes and
//! hands out one complete object at a time:
//!
//! ```text
//! depth ← 0, start ← None
//! for each byte bᵢ outside a string literal:
//!     '{' → if depth = 0 { start ← i }; depth ← depth + 1
//!     '}' → depth ← depth - 1; if depth = 0 { emit B[start..=i] }
//! ```
//!
//! Bytes that precede an object (newlines, keep-alive whitespace) are
//! discarded with it.

use crate::errors::{AgentError, Result};
use serde::Deserialize;

/// Maximum buffered bytes before the stream is considered broken (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// One decoded `/api/chat` stream object
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub message: Option<FrameMessage>,
    #[serde(default)]
    pub done: bool,
    /// Server-side failure reported inside the stream
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FrameMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatFrame {
    /// Text fragment carried by this frame
    pub fn token(&self) -> &str {
        self.message.as_ref().map(|m| m.content.as_str()).unwrap_or("")
    }
}

#[derive(Debug)]
pub struct FrameParser {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Append `bytes` and return every frame they complete
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<ChatFrame>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(AgentError::JsonParseError(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        while let Some(raw) = self.next_object()? {
            frames.push(parse_frame(&raw)?);
        }
        Ok(frames)
    }

    /// Parse whatever remains once the stream has ended
    ///
    /// Trailing whitespace is fine; a truncated object is an error.
    pub fn finish(&mut self) -> Result<Option<ChatFrame>> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        if rest.is_empty() {
            return Ok(None);
        }
        parse_frame(&rest).map(Some)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn next_object(&mut self) -> Result<Option<String>> {
        let Some((start, end)) = self.find_complete_object()? else {
            return Ok(None);
        };
        let raw = String::from_utf8_lossy(&self.buffer[start..=end]).to_string();
        self.buffer.drain(..=end);
        Ok(Some(raw))
    }

    fn find_complete_object(&self) -> Result<Option<(usize, usize)>> {
        let mut depth = 0i32;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                _ if in_string => {}
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(AgentError::JsonParseError(
                            "Mismatched braces: too many closing braces".to_string(),
                        ));
                    }
                    if depth == 0 {
                        if let Some(start) = start {
                            return Ok(Some((start, i)));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode one stream object
pub fn parse_frame(raw: &str) -> Result<ChatFrame> {
    serde_json::from_str(raw)
        .map_err(|e| AgentError::JsonParseError(format!("Failed to parse chat frame: {}", e)))
}
