// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Anthropic Messages API provider
//!
//! The system prompt travels as a top-level `system` field, assistant tool
//! calls become `tool_use` content blocks, and canonical tool messages are
//! merged into a following `user` message of `tool_result` blocks. Streaming
//! uses typed events; tool-argument JSON arrives as `input_json_delta`
//! fragments keyed by content-block index.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, CaretError, Result};
use crate::llm::message::{Message, Role, ToolCall, ToolFunction};
use crate::llm::provider::{
    ChatCompletion, ChatOptions, ChatProvider, ChatStream, FinishReason, ModelInfo, StreamChunk,
    ToolCallDelta, ToolDefinition, Usage,
};
use crate::llm::providers::status_error;
use crate::llm::sse::{sse_stream, SseEvent};

const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic Messages provider
pub struct AnthropicProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    models: Vec<String>,
}

impl AnthropicProvider {
    /// Create a new provider for an endpoint and model list.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.endpoint, MESSAGES_PATH)
    }

    /// Extract the system prompt; the Messages API refuses system roles in
    /// the message list.
    fn system_prompt(messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    /// Convert canonical messages to the wire format.
    ///
    /// Tool messages are folded into a user message of `tool_result` blocks;
    /// consecutive tool messages share one user message.
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        let mut out: Vec<WireMessage> = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {}
                Role::User => out.push(WireMessage {
                    role: "user".to_string(),
                    content: WireContent::Text(message.content.clone()),
                }),
                Role::Assistant => {
                    let mut blocks: Vec<WireBlock> = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(WireBlock::Text {
                            text: message.content.clone(),
                        });
                    }
                    for call in message.tool_calls() {
                        blocks.push(WireBlock::ToolUse {
                            id: call.id.clone(),
                            name: call.function.name.clone(),
                            input: serde_json::from_str(&call.function.arguments)
                                .unwrap_or_else(|_| {
                                    serde_json::Value::Object(serde_json::Map::new())
                                }),
                        });
                    }
                    out.push(WireMessage {
                        role: "assistant".to_string(),
                        content: WireContent::Blocks(blocks),
                    });
                }
                Role::Tool => {
                    let block = WireBlock::ToolResult {
                        tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                        content: message.content.clone(),
                    };
                    let mergeable = matches!(
                        out.last(),
                        Some(WireMessage {
                            role,
                            content: WireContent::Blocks(blocks),
                        }) if role == "user"
                            && blocks.iter().all(|b| matches!(b, WireBlock::ToolResult { .. }))
                    );
                    if mergeable {
                        if let Some(WireMessage {
                            content: WireContent::Blocks(blocks),
                            ..
                        }) = out.last_mut()
                        {
                            blocks.push(block);
                        }
                    } else {
                        out.push(WireMessage {
                            role: "user".to_string(),
                            content: WireContent::Blocks(vec![block]),
                        });
                    }
                }
            }
        }

        out
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|t| WireTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: serde_json::to_value(&t.input_schema)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect()
    }

    fn build_request(messages: &[Message], options: &ChatOptions, stream: bool) -> WireRequest {
        WireRequest {
            model: options.model.clone(),
            messages: Self::convert_messages(messages),
            system: Self::system_prompt(messages),
            max_tokens: options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: options.temperature,
            tools: if options.tools.is_empty() {
                None
            } else {
                Some(Self::convert_tools(&options.tools))
            },
            stream,
        }
    }

    async fn post(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let body = Self::build_request(messages, options, stream);
        let response = self
            .client
            .post(self.url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CaretError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.models.iter().map(ModelInfo::new).collect()
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatCompletion> {
        let response = self.post(messages, options, false).await?;
        let api_response: WireResponse = response
            .json()
            .await
            .map_err(|e| CaretError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        for block in api_response.content {
            match block {
                WireBlock::Text { text: t } => text.push_str(&t),
                WireBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    function: ToolFunction {
                        name,
                        arguments: input.to_string(),
                    },
                }),
                WireBlock::ToolResult { .. } => {}
            }
        }

        let finish_reason = api_response
            .stop_reason
            .as_deref()
            .map(FinishReason::from_wire)
            .unwrap_or(FinishReason::Stop);

        Ok(ChatCompletion {
            message: Message::assistant_with_tool_calls(text, tool_calls),
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
            finish_reason,
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatStream> {
        let response = self.post(messages, options, true).await?;

        let chunks = sse_stream(response).filter_map(|event| async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => return Some(Err(e)),
            };
            match map_stream_event(&event) {
                Some(chunk) => Some(Ok(chunk)),
                None => None,
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Map one typed SSE event onto a canonical chunk.
///
/// The content-block index doubles as the canonical tool-call delta index;
/// the assembler orders calls by first appearance, which matches block
/// order.
fn map_stream_event(event: &SseEvent) -> Option<StreamChunk> {
    let event_type = event.event.as_deref()?;
    let parsed: serde_json::Value = match serde_json::from_str(&event.data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("skipping unparseable {} event: {}", event_type, e);
            return None;
        }
    };

    match event_type {
        "content_block_start" => {
            let index = parsed["index"].as_u64()? as usize;
            let block = &parsed["content_block"];
            if block["type"].as_str()? != "tool_use" {
                return None;
            }
            Some(StreamChunk::tool_fragment(ToolCallDelta {
                index,
                id: block["id"].as_str().map(String::from),
                name: block["name"].as_str().map(String::from),
                arguments: None,
            }))
        }
        "content_block_delta" => {
            let index = parsed["index"].as_u64()? as usize;
            let delta = &parsed["delta"];
            match delta["type"].as_str()? {
                "text_delta" => Some(StreamChunk::text(delta["text"].as_str()?)),
                "input_json_delta" => Some(StreamChunk::tool_fragment(ToolCallDelta {
                    index,
                    id: None,
                    name: None,
                    arguments: delta["partial_json"].as_str().map(String::from),
                })),
                _ => None,
            }
        }
        "message_delta" => {
            let stop_reason = parsed["delta"]["stop_reason"].as_str()?;
            Some(StreamChunk::finish(FinishReason::from_wire(stop_reason)))
        }
        "error" => {
            tracing::warn!("stream error event: {}", event.data);
            None
        }
        // message_start, content_block_stop, message_stop, ping
        _ => None,
    }
}

// Anthropic wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<WireBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(
            "https://api.anthropic.com",
            "test-key",
            vec!["claude-test".to_string()],
        )
    }

    fn sse(event: &str, data: &str) -> SseEvent {
        SseEvent {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_url_shape() {
        assert_eq!(provider().url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_name_and_capabilities() {
        let p = provider();
        assert_eq!(p.name(), "anthropic");
        assert!(p.supports_tools());
        assert_eq!(p.list_models()[0].id, "claude-test");
    }

    #[test]
    fn test_system_extracted_from_messages() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let request = AnthropicProvider::build_request(&messages, &ChatOptions::new("m"), false);
        assert_eq!(request.system.as_deref(), Some("be terse"));
        // And the system message is gone from the list.
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn test_convert_assistant_tool_calls_to_blocks() {
        let messages = vec![Message::assistant_with_tool_calls(
            "checking",
            vec![ToolCall::new("tu_1", "read_file", r#"{"path":"a"}"#)],
        )];
        let wire = AnthropicProvider::convert_messages(&messages);

        assert_eq!(wire.len(), 1);
        match &wire[0].content {
            WireContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(blocks[0], WireBlock::Text { .. }));
                match &blocks[1] {
                    WireBlock::ToolUse { id, name, input } => {
                        assert_eq!(id, "tu_1");
                        assert_eq!(name, "read_file");
                        assert_eq!(input["path"], "a");
                    }
                    other => panic!("expected ToolUse, got {:?}", other),
                }
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_unparseable_arguments_become_empty_object() {
        let messages = vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("tu_1", "read_file", "{broken")],
        )];
        let wire = AnthropicProvider::convert_messages(&messages);
        match &wire[0].content {
            WireContent::Blocks(blocks) => match &blocks[0] {
                WireBlock::ToolUse { input, .. } => {
                    assert!(input.as_object().unwrap().is_empty());
                }
                other => panic!("expected ToolUse, got {:?}", other),
            },
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_consecutive_tool_messages_merge_into_one_user_message() {
        let messages = vec![
            Message::assistant_with_tool_calls(
                "",
                vec![
                    ToolCall::new("tu_1", "read_file", "{}"),
                    ToolCall::new("tu_2", "glob_find", "{}"),
                ],
            ),
            Message::tool("tu_1", "one"),
            Message::tool("tu_2", "two"),
        ];
        let wire = AnthropicProvider::convert_messages(&messages);

        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1].role, "user");
        match &wire[1].content {
            WireContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                match &blocks[0] {
                    WireBlock::ToolResult { tool_use_id, content } => {
                        assert_eq!(tool_use_id, "tu_1");
                        assert_eq!(content, "one");
                    }
                    other => panic!("expected ToolResult, got {:?}", other),
                }
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_message_after_user_text_starts_new_user_message() {
        let messages = vec![Message::user("plain"), Message::tool("tu_1", "r")];
        let wire = AnthropicProvider::convert_messages(&messages);
        assert_eq!(wire.len(), 2);
    }

    #[test]
    fn test_map_content_block_start_tool_use() {
        let event = sse(
            "content_block_start",
            r#"{"index":1,"content_block":{"type":"tool_use","id":"tu_9","name":"exec_shell"}}"#,
        );
        let chunk = map_stream_event(&event).unwrap();
        let frag = &chunk.delta.tool_calls[0];
        assert_eq!(frag.index, 1);
        assert_eq!(frag.id.as_deref(), Some("tu_9"));
        assert_eq!(frag.name.as_deref(), Some("exec_shell"));
        assert!(frag.arguments.is_none());
    }

    #[test]
    fn test_map_content_block_start_text_ignored() {
        let event = sse(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"text","text":""}}"#,
        );
        assert!(map_stream_event(&event).is_none());
    }

    #[test]
    fn test_map_text_delta() {
        let event = sse(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        );
        let chunk = map_stream_event(&event).unwrap();
        assert_eq!(chunk.delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_map_input_json_delta() {
        let event = sse(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"{\"comm"}}"#,
        );
        let chunk = map_stream_event(&event).unwrap();
        let frag = &chunk.delta.tool_calls[0];
        assert_eq!(frag.index, 1);
        assert_eq!(frag.arguments.as_deref(), Some("{\"comm"));
    }

    #[test]
    fn test_map_message_delta_tool_use_becomes_tool_calls() {
        let event = sse("message_delta", r#"{"delta":{"stop_reason":"tool_use"}}"#);
        let chunk = map_stream_event(&event).unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn test_map_message_delta_end_turn_becomes_stop() {
        let event = sse("message_delta", r#"{"delta":{"stop_reason":"end_turn"}}"#);
        let chunk = map_stream_event(&event).unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_map_ping_and_stop_ignored() {
        assert!(map_stream_event(&sse("ping", "{}")).is_none());
        assert!(map_stream_event(&sse("message_stop", "{}")).is_none());
        assert!(map_stream_event(&sse("content_block_stop", r#"{"index":0}"#)).is_none());
    }

    #[test]
    fn test_map_unparseable_data_skipped() {
        assert!(map_stream_event(&sse("content_block_delta", "{broken")).is_none());
    }

    #[test]
    fn test_build_request_defaults_max_tokens() {
        let request = AnthropicProvider::build_request(
            &[Message::user("x")],
            &ChatOptions::new("m"),
            true,
        );
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(request.stream);
    }
}
