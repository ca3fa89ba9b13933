//! Message types for the conversation with the model
//!
//! The conversation history is an ordered list of role-tagged messages.
//! System prompts are not stored in it; they are rebuilt for every request
//! from the current session state.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Unix timestamp (seconds); zero for synthesized messages
    #[serde(default)]
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_secs(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            timestamp: 0,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Estimate token count for this message
    pub fn estimate_tokens(&self) -> usize {
        // Heuristic: 1 token ≈ 4 characters
        self.content.chars().count() / 4
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));

        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_missing_timestamp_defaults() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.timestamp, 0);
    }

    #[test]
    fn test_token_estimation() {
        let msg = ChatMessage::user("Write a 400 character test string");
        let tokens = msg.estimate_tokens();
        assert!(tokens >= 7 && tokens <= 12);
    }

    #[test]
    fn test_system_message_is_timeless() {
        assert_eq!(ChatMessage::system("rules").timestamp, 0);
        assert_eq!(Role::System.as_str(), "system");
    }
}
