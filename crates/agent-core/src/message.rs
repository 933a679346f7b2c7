//! Conversation Messages
//!
//! Standard message format and the append-only log that one agent run owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool results fed back to the backend
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolResult => write!(f, "tool-result"),
        }
    }
}

/// Message body: plain text, or a backend-native payload replayed verbatim
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Native(Value),
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Native(_) => None,
        }
    }

    pub const fn as_native(&self) -> Option<&Value> {
        match self {
            Self::Text(_) => None,
            Self::Native(value) => Some(value),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Body
    pub content: Content,

    /// Tool requests carried by an assistant turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Results carried by a tool-result turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Content::Text(content.into()))
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Content::Text(content.into()))
    }

    /// Assistant turn exactly as the backend produced it
    pub fn assistant_native(raw: Value, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, Content::Native(raw));
        msg.tool_calls = tool_calls;
        msg
    }

    /// Tool-result turn in the active backend's wire shape
    pub fn tool_results_native(raw: Value, results: Vec<ToolResult>) -> Self {
        let mut msg = Self::new(Role::ToolResult, Content::Native(raw));
        msg.tool_results = results;
        msg
    }
}

/// Ordered, append-only conversation history for one run
///
/// Not synchronised: the orchestrator owns it and appends only between rounds.
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear prior content and seed the system preamble and the user request
    pub fn reset(&mut self, system_prompt: &str, user_input: &str) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
        self.messages.push(Message::user(user_input));
    }

    /// Add a message
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Ordered view of every message so far
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }
}
