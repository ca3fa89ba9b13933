//! Type definitions module
//!
//! Conversation message types shared by the orchestrator, the correction
//! loop and the model transport.

pub mod messages;

// Re-export commonly used types
pub use messages::{ChatMessage, Role};
