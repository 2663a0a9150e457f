//! Message domain types.
//!
//! A `Message` is one entry in the conversation history. Ordering within
//! the history is the sole source of truth for conversation order; the
//! `sequence_index` is a monotonically increasing identifier assigned by
//! the context manager on append.

use serde::{Deserialize, Serialize};

use crate::token;

/// The role of a message in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The model's prose output.
    Assistant,
    /// The outcome of one tool invocation, fed back to the model.
    ToolResult,
    /// A condensed replacement for summarized-away history.
    SystemSummary,
}

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The text content.
    pub content: String,

    /// Estimated token cost of this message (content + overhead).
    pub estimated_tokens: usize,

    /// Monotonic identifier assigned on append. Zero until appended.
    pub sequence_index: u64,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let estimated_tokens = token::estimate_message_tokens(&content);
        Self {
            role,
            content,
            estimated_tokens,
            sequence_index: 0,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(Role::ToolResult, content)
    }

    /// Create a summary message that stands in for compressed history.
    pub fn system_summary(content: impl Into<String>) -> Self {
        Self::new(Role::SystemSummary, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, quill!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, quill!");
        assert_eq!(msg.sequence_index, 0);
    }

    #[test]
    fn token_estimate_matches_heuristic() {
        // 20 chars → 5 tokens + 4 overhead
        let msg = Message::assistant("12345678901234567890");
        assert_eq!(msg.estimated_tokens, 9);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool_result("ok");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::ToolResult);
        assert_eq!(back.content, "ok");
        assert_eq!(back.estimated_tokens, msg.estimated_tokens);
    }

    #[test]
    fn role_serde_names() {
        let json = serde_json::to_string(&Role::SystemSummary).unwrap();
        assert_eq!(json, "\"system_summary\"");
    }
}
