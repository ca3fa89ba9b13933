//! Ollama transport
//!
//! Streaming chat client and the incremental frame parser behind it.

pub mod client;
pub mod parser;

pub use client::{OllamaClient, TokenSink, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use parser::{parse_frame, ChatFrame, FrameParser, MAX_BUFFER_SIZE};
