// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Message types for LLM interactions
//!
//! Defines the canonical message structures exchanged with providers. Tool
//! arguments are carried as an opaque JSON string because providers stream
//! them as concatenated fragments; only the tool executor parses them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result
    Tool,
}

/// A model-emitted request to invoke a named function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// Opaque identifier assigned by the provider
    pub id: String,

    /// The function to invoke
    pub function: ToolFunction,
}

/// The function half of a tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolFunction {
    /// Function name
    pub name: String,

    /// Arguments as a JSON object, transported as a string
    pub arguments: String,
}

impl ToolCall {
    /// Create a tool call from its parts.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: ToolFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message
    pub id: Uuid,

    /// Role of the message sender
    pub role: Role,

    /// Text content (possibly empty)
    pub content: String,

    /// Tool call this message answers (present iff role is Tool)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls emitted by the assistant (assistant messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn base(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool calls
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let mut msg = Self::base(Role::Assistant, content);
        if !tool_calls.is_empty() {
            msg.tool_calls = Some(tool_calls);
        }
        msg
    }

    /// Create a tool result message
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::base(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Tool calls carried by this message, empty for non-assistant messages.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Check if the message carries any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Conversation history
///
/// Invariants: index 0 is the single system message; every tool message
/// answers a tool call emitted by an earlier assistant message; tool call
/// ids are unique across the conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// All messages in order
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation seeded with a system prompt
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Add a message to the conversation
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get the last assistant message
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Check if the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Drop everything except the system message and the last `keep` messages.
    ///
    /// Used by the REPL `/compact` command.
    pub fn compact(&mut self, keep: usize) -> usize {
        let system: Vec<Message> = self
            .messages
            .iter()
            .take(1)
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        let body_len = self.messages.len() - system.len();
        if body_len <= keep {
            return 0;
        }
        let removed = body_len - keep;
        let tail: Vec<Message> = self
            .messages
            .iter()
            .skip(system.len() + removed)
            .cloned()
            .collect();
        self.messages = system;
        self.messages.extend(tail);
        removed
    }

    /// Clear all messages except the system message
    pub fn clear_history(&mut self) {
        let system = self
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .cloned();
        self.messages.clear();
        if let Some(system) = system {
            self.messages.push(system);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_call_id.is_none());
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_message_system() {
        let msg = Message::system("You are a coding agent");
        assert_eq!(msg.role, Role::System);
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_message_assistant_with_tool_calls() {
        let calls = vec![ToolCall::new("call_1", "read_file", r#"{"path":"a"}"#)];
        let msg = Message::assistant_with_tool_calls("reading", calls);
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.tool_calls()[0].function.name, "read_file");
    }

    #[test]
    fn test_message_assistant_empty_tool_calls_stays_none() {
        let msg = Message::assistant_with_tool_calls("done", vec![]);
        assert!(msg.tool_calls.is_none());
    }

    #[test]
    fn test_message_tool() {
        let msg = Message::tool("call_1", "file contents");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(format!("{}", Role::System), "system");
        assert_eq!(format!("{}", Role::User), "user");
        assert_eq!(format!("{}", Role::Assistant), "assistant");
        assert_eq!(format!("{}", Role::Tool), "tool");
    }

    #[test]
    fn test_role_serialization() {
        let roles = [Role::System, Role::User, Role::Assistant, Role::Tool];
        for role in roles {
            let json = serde_json::to_string(&role).unwrap();
            let parsed: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(role, parsed);
        }
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), "\"tool\"");
    }

    #[test]
    fn test_message_serialization_roundtrip() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "exec_shell", r#"{"command":"ls"}"#)],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, Role::Assistant);
        assert_eq!(parsed.tool_calls().len(), 1);
        assert_eq!(parsed.tool_calls()[0].id, "c1");
    }

    #[test]
    fn test_message_serialization_omits_empty_options() {
        let msg = Message::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_call_id"));
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn test_message_unique_ids() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_conversation_with_system() {
        let conv = Conversation::with_system("be helpful");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages[0].role, Role::System);
    }

    #[test]
    fn test_conversation_push_and_last() {
        let mut conv = Conversation::new();
        assert!(conv.last().is_none());

        conv.push(Message::user("Hello"));
        conv.push(Message::assistant("Hi"));

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_conversation_last_assistant() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hello"));
        conv.push(Message::assistant("Hi"));
        conv.push(Message::user("again"));

        assert_eq!(conv.last_assistant().unwrap().content, "Hi");
    }

    #[test]
    fn test_conversation_compact_keeps_system_and_tail() {
        let mut conv = Conversation::with_system("sys");
        for i in 0..10 {
            conv.push(Message::user(format!("u{}", i)));
        }

        let removed = conv.compact(4);
        assert_eq!(removed, 6);
        assert_eq!(conv.len(), 5);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[1].content, "u6");
        assert_eq!(conv.messages[4].content, "u9");
    }

    #[test]
    fn test_conversation_compact_noop_when_short() {
        let mut conv = Conversation::with_system("sys");
        conv.push(Message::user("u"));
        conv.push(Message::assistant("a"));

        assert_eq!(conv.compact(4), 0);
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_conversation_clear_history() {
        let mut conv = Conversation::with_system("sys");
        conv.push(Message::user("u"));
        conv.push(Message::assistant("a"));

        conv.clear_history();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages[0].role, Role::System);
    }

    #[test]
    fn test_tool_call_equality() {
        let a = ToolCall::new("id", "name", "{}");
        let b = ToolCall::new("id", "name", "{}");
        assert_eq!(a, b);
    }
}
