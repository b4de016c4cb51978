// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! LLM provider trait and related types
//!
//! Defines the abstraction layer that hides the four backend wire protocols
//! behind one streaming/non-streaming chat contract. Adapters translate the
//! canonical message list to their wire format and back; the agent loop only
//! ever sees the types defined here.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// A lazy, finite, non-restartable sequence of stream chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Main trait for chat providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name (e.g. "anthropic", "openai_chat")
    fn name(&self) -> &str;

    /// Whether this provider accepts client-side tool definitions
    fn supports_tools(&self) -> bool;

    /// List the models this provider is configured to serve
    fn list_models(&self) -> Vec<ModelInfo>;

    /// Non-streaming completion
    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatCompletion>;

    /// Streaming completion
    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatStream>;
}

/// Options for a completion request
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model (or deployment) identifier
    pub model: String,

    /// Whether the caller intends to stream
    pub stream: bool,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum tokens in the response
    pub max_tokens: Option<u32>,

    /// Tools available for the model to use
    pub tools: Vec<ToolDefinition>,
}

impl ChatOptions {
    /// Create options for a model with defaults
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            stream: false,
            temperature: None,
            max_tokens: None,
            tools: vec![],
        }
    }

    /// Set the streaming flag
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the response token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the tool definitions
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Response from a non-streaming completion
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// The complete assistant message
    pub message: Message,

    /// Token usage, when the backend reports it
    pub usage: Option<Usage>,

    /// Why the model stopped
    pub finish_reason: FinishReason,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of message
    Stop,
    /// The model wants tools executed
    ToolCalls,
    /// Hit the token cap
    Length,
    /// Anything else the wire reported
    Other,
}

impl FinishReason {
    /// Map a wire-format finish string onto the canonical enum.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "stop_sequence" | "completed" => FinishReason::Stop,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            "length" | "max_tokens" | "incomplete" => FinishReason::Length,
            _ => FinishReason::Other,
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Output tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

impl Usage {
    /// Get total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One chunk of a streaming response
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Incremental message content
    pub delta: StreamDelta,

    /// Terminal finish reason, present on the closing chunk(s)
    pub finish_reason: Option<FinishReason>,
}

/// The delta payload of a stream chunk
#[derive(Debug, Clone, Default)]
pub struct StreamDelta {
    /// Role, usually only on the first chunk
    pub role: Option<String>,

    /// Text fragment
    pub content: Option<String>,

    /// Partial tool calls, index-normalized by the adapter
    pub tool_calls: Vec<ToolCallDelta>,
}

/// A partial tool call carried by a stream chunk
///
/// Adapters normalize whatever the wire keys fragments by (sequential index,
/// content-block index, item id) to a single `index` assigned in order of
/// first appearance, so reassembly is identical across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    /// Fragment key, stable for the lifetime of one tool call
    pub index: usize,

    /// Identifier fragment; the first non-empty one fixes the id
    pub id: Option<String>,

    /// Function name fragment, concatenated across chunks
    pub name: Option<String>,

    /// Function arguments fragment, concatenated across chunks
    pub arguments: Option<String>,
}

impl StreamChunk {
    /// A chunk carrying only text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delta: StreamDelta {
                content: Some(content.into()),
                ..Default::default()
            },
            finish_reason: None,
        }
    }

    /// A chunk carrying a single tool-call fragment.
    pub fn tool_fragment(delta: ToolCallDelta) -> Self {
        Self {
            delta: StreamDelta {
                tool_calls: vec![delta],
                ..Default::default()
            },
            finish_reason: None,
        }
    }

    /// A terminal chunk carrying only a finish reason.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            delta: StreamDelta::default(),
            finish_reason: Some(reason),
        }
    }
}

/// Tool definition sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Human description
    pub description: String,

    /// Input schema (JSON Schema object)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// Information about a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Optional human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelInfo {
    /// Model info with just an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
        }
    }

    /// Model info with a description.
    pub fn with_description(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: Some(description.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_options_new() {
        let options = ChatOptions::new("gpt-test");
        assert_eq!(options.model, "gpt-test");
        assert!(!options.stream);
        assert!(options.temperature.is_none());
        assert!(options.max_tokens.is_none());
        assert!(options.tools.is_empty());
    }

    #[test]
    fn test_chat_options_chained() {
        let options = ChatOptions::new("m")
            .with_stream(true)
            .with_temperature(0.2)
            .with_max_tokens(1024);

        assert!(options.stream);
        assert!((options.temperature.unwrap() - 0.2).abs() < 0.001);
        assert_eq!(options.max_tokens, Some(1024));
    }

    #[test]
    fn test_chat_options_with_tools() {
        let tools = vec![ToolDefinition {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: serde_json::json!({}),
                required: vec![],
            },
        }];
        let options = ChatOptions::new("m").with_tools(tools);
        assert_eq!(options.tools.len(), 1);
        assert_eq!(options.tools[0].name, "read_file");
    }

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("end_turn"), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("tool_use"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::from_wire("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("max_tokens"), FinishReason::Length);
        assert_eq!(FinishReason::from_wire("banana"), FinishReason::Other);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
        };
        assert_eq!(usage.total_tokens(), 150);
        assert_eq!(Usage::default().total_tokens(), 0);
    }

    #[test]
    fn test_stream_chunk_text() {
        let chunk = StreamChunk::text("hello");
        assert_eq!(chunk.delta.content.as_deref(), Some("hello"));
        assert!(chunk.delta.tool_calls.is_empty());
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn test_stream_chunk_tool_fragment() {
        let chunk = StreamChunk::tool_fragment(ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("read_file".to_string()),
            arguments: None,
        });
        assert_eq!(chunk.delta.tool_calls.len(), 1);
        assert_eq!(chunk.delta.tool_calls[0].index, 0);
    }

    #[test]
    fn test_stream_chunk_finish() {
        let chunk = StreamChunk::finish(FinishReason::ToolCalls);
        assert_eq!(chunk.finish_reason, Some(FinishReason::ToolCalls));
        assert!(chunk.delta.content.is_none());
    }

    #[test]
    fn test_model_info() {
        let plain = ModelInfo::new("m1");
        assert!(plain.description.is_none());

        let described = ModelInfo::with_description("m2", "the better one");
        assert_eq!(described.description.as_deref(), Some("the better one"));
    }

    #[test]
    fn test_tool_input_schema_serialization() {
        let schema = ToolInputSchema {
            schema_type: "object".to_string(),
            properties: serde_json::json!({"path": {"type": "string"}}),
            required: vec!["path".to_string()],
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["required"][0], "path");
    }
}
