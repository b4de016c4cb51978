// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! OpenAI Responses API provider
//!
//! The system prompt travels as the `instructions` field and the input is a
//! heterogeneous item list: user/assistant messages, prior `function_call`
//! items, and `function_call_output` items carrying earlier tool results.
//! Tools are flattened without a `function` wrapper. Streaming events are
//! named; argument fragments are keyed by `item_id`, and the assembled tool
//! call is emitted at `response.function_call_arguments.done` with the
//! outward id taken from `call_id`.

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

const RESPONSES_PATH: &str = "/openai/v1/responses";

/// OpenAI Responses provider
pub struct ResponsesProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    models: Vec<String>,
}

impl ResponsesProvider {
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
        format!("{}{}", self.endpoint, RESPONSES_PATH)
    }

    fn instructions(messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
    }

    /// Convert canonical messages to the heterogeneous input list.
    fn convert_input(messages: &[Message]) -> Vec<WireInputItem> {
        let mut items = Vec::new();
        for message in messages {
            match message.role {
                Role::System => {}
                Role::User => items.push(WireInputItem::Message {
                    role: "user".to_string(),
                    content: message.content.clone(),
                }),
                Role::Assistant => {
                    if !message.content.is_empty() {
                        items.push(WireInputItem::Message {
                            role: "assistant".to_string(),
                            content: message.content.clone(),
                        });
                    }
                    for call in message.tool_calls() {
                        items.push(WireInputItem::FunctionCall {
                            call_id: call.id.clone(),
                            name: call.function.name.clone(),
                            arguments: call.function.arguments.clone(),
                        });
                    }
                }
                Role::Tool => items.push(WireInputItem::FunctionCallOutput {
                    call_id: message.tool_call_id.clone().unwrap_or_default(),
                    output: message.content.clone(),
                }),
            }
        }
        items
    }

    /// Tools are flattened: `{type, name, description, parameters}`.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function".to_string(),
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: serde_json::to_value(&t.input_schema)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect()
    }

    fn build_request(messages: &[Message], options: &ChatOptions, stream: bool) -> WireRequest {
        WireRequest {
            model: options.model.clone(),
            instructions: Self::instructions(messages),
            input: Self::convert_input(messages),
            tools: if options.tools.is_empty() {
                None
            } else {
                Some(Self::convert_tools(&options.tools))
            },
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
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
            .header("api-key", &self.api_key)
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
impl ChatProvider for ResponsesProvider {
    fn name(&self) -> &str {
        "responses"
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
        for item in api_response.output {
            match item {
                WireOutputItem::Message { content } => {
                    for part in content {
                        if part.part_type == "output_text" {
                            text.push_str(&part.text);
                        }
                    }
                }
                WireOutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                    ..
                } => tool_calls.push(ToolCall {
                    id: call_id,
                    function: ToolFunction { name, arguments },
                }),
                WireOutputItem::Reasoning => {}
            }
        }

        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        };

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

        let chunks = sse_stream(response)
            .scan(StreamState::default(), |state, event| {
                let out = match event {
                    Ok(event) => state.handle(&event).map(Ok),
                    Err(e) => Some(Err(e)),
                };
                futures::future::ready(Some(out))
            })
            .filter_map(|item| async move { item });

        Ok(Box::pin(chunks))
    }
}

/// Per-stream bookkeeping: item ids in first-seen order, with the outward
/// call id and name captured at `output_item.added`.
#[derive(Debug, Default)]
struct StreamState {
    items: Vec<TrackedItem>,
    emitted_tool_calls: bool,
}

#[derive(Debug)]
struct TrackedItem {
    item_id: String,
    call_id: String,
    name: String,
}

impl StreamState {
    fn index_of(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.item_id == item_id)
    }

    fn handle(&mut self, event: &SseEvent) -> Option<StreamChunk> {
        let parsed: serde_json::Value = match serde_json::from_str(&event.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("skipping unparseable responses event: {}", e);
                return None;
            }
        };
        let event_type = parsed["type"]
            .as_str()
            .map(String::from)
            .or_else(|| event.event.clone())?;

        match event_type.as_str() {
            "response.output_text.delta" => {
                Some(StreamChunk::text(parsed["delta"].as_str()?))
            }
            "response.output_item.added" => {
                let item = &parsed["item"];
                if item["type"].as_str() != Some("function_call") {
                    return None;
                }
                let item_id = item["id"]
                    .as_str()
                    .or_else(|| parsed["item_id"].as_str())?
                    .to_string();
                if self.index_of(&item_id).is_none() {
                    self.items.push(TrackedItem {
                        item_id,
                        call_id: item["call_id"].as_str().unwrap_or_default().to_string(),
                        name: item["name"].as_str().unwrap_or_default().to_string(),
                    });
                }
                None
            }
            // Argument fragments are tracked by the `done` event; nothing to
            // emit incrementally since the terminal event carries the full
            // arguments string.
            "response.function_call_arguments.delta" => None,
            "response.function_call_arguments.done" => {
                let item_id = parsed["item_id"].as_str()?;
                let index = self.index_of(item_id)?;
                let item = &self.items[index];
                self.emitted_tool_calls = true;
                Some(StreamChunk::tool_fragment(ToolCallDelta {
                    index,
                    id: Some(item.call_id.clone()),
                    name: Some(item.name.clone()),
                    arguments: Some(parsed["arguments"].as_str().unwrap_or_default().to_string()),
                }))
            }
            "response.completed" => Some(StreamChunk::finish(if self.emitted_tool_calls {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            })),
            _ => None,
        }
    }
}

// Responses wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    input: Vec<WireInputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireInputItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    output: Vec<WireOutputItem>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireOutputItem {
    Message {
        #[serde(default)]
        content: Vec<WireOutputPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    Reasoning,
}

#[derive(Debug, Deserialize)]
struct WireOutputPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
