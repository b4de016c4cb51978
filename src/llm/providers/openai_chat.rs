// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! OpenAI-style chat-completions provider
//!
//! Speaks the deployment-scoped chat completions protocol:
//! `{endpoint}/openai/deployments/{model}/chat/completions?api-version=...`
//! with an `api-key` header. Streaming replies arrive as `data:` SSE lines
//! terminated by a `data: [DONE]` sentinel; tool-call fragments carry an
//! explicit index which maps straight onto the canonical delta index.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, CaretError, Result};
use crate::llm::message::{Message, ToolCall, ToolFunction};
use crate::llm::provider::{
    ChatCompletion, ChatOptions, ChatProvider, ChatStream, FinishReason, ModelInfo, StreamChunk,
    StreamDelta, ToolCallDelta, ToolDefinition, Usage,
};
use crate::llm::providers::status_error;
use crate::llm::sse::sse_stream;

const COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI-style chat completions provider
pub struct OpenAiChatProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    models: Vec<String>,
}

impl OpenAiChatProvider {
    /// Create a new provider for an endpoint and deployment list.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            models,
        }
    }

    fn url(&self, model: &str) -> String {
        format!(
            "{}/openai/deployments/{}{}?api-version={}",
            self.endpoint, model, COMPLETIONS_PATH, self.api_version
        )
    }

    /// Convert canonical messages to the wire format.
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.to_string(),
                content: if m.content.is_empty() && m.has_tool_calls() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: m.tool_calls.as_ref().map(|calls| {
                    calls
                        .iter()
                        .map(|c| WireToolCall {
                            id: c.id.clone(),
                            call_type: "function".to_string(),
                            function: WireFunction {
                                name: c.function.name.clone(),
                                arguments: c.function.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
        tools
            .iter()
            .map(|t| WireTool {
                tool_type: "function".to_string(),
                function: WireToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: serde_json::to_value(&t.input_schema)
                        .unwrap_or(serde_json::Value::Null),
                },
            })
            .collect()
    }

    fn build_request(messages: &[Message], options: &ChatOptions, stream: bool) -> WireRequest {
        WireRequest {
            messages: Self::convert_messages(messages),
            tools: if options.tools.is_empty() {
                None
            } else {
                Some(Self::convert_tools(&options.tools))
            },
            stream,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }

    async fn post(&self, messages: &[Message], options: &ChatOptions, stream: bool) -> Result<reqwest::Response> {
        let body = Self::build_request(messages, options, stream);
        let response = self
            .client
            .post(self.url(&options.model))
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
impl ChatProvider for OpenAiChatProvider {
    fn name(&self) -> &str {
        "openai_chat"
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

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CaretError::Api(ApiError::InvalidResponse("empty choices".into())))?;

        let wire_message = choice.message.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = wire_message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                function: ToolFunction {
                    name: c.function.name,
                    arguments: c.function.arguments,
                },
            })
            .collect();

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_wire)
            .unwrap_or(if tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            });

        Ok(ChatCompletion {
            message: Message::assistant_with_tool_calls(
                wire_message.content.unwrap_or_default(),
                tool_calls,
            ),
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
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
            if event.data == "[DONE]" {
                return None;
            }
            match parse_stream_data(&event.data) {
                Some(chunk) => Some(Ok(chunk)),
                None => {
                    tracing::warn!("skipping unparseable stream line: {}", event.data);
                    None
                }
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Parse one `data:` JSON payload into a canonical chunk.
fn parse_stream_data(data: &str) -> Option<StreamChunk> {
    let parsed: WireStreamResponse = serde_json::from_str(data).ok()?;
    let choice = parsed.choices.into_iter().next()?;

    let delta = choice.delta.unwrap_or_default();
    let tool_calls = delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|c| ToolCallDelta {
            index: c.index,
            id: c.id,
            name: c.function.as_ref().and_then(|f| f.name.clone()),
            arguments: c.function.as_ref().and_then(|f| f.arguments.clone()),
        })
        .collect();

    Some(StreamChunk {
        delta: StreamDelta {
            role: delta.role,
            content: delta.content,
            tool_calls,
        },
        finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_wire),
    })
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamResponse {
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: Option<WireStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireStreamDelta {
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<WireStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireStreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<WireStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct WireStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiChatProvider {
        OpenAiChatProvider::new(
            "https://example.openai.azure.com/",
            "test-key",
            "2024-06-01",
            vec!["gpt-test".to_string()],
        )
    }

    #[test]
    fn test_url_shape() {
        let p = provider();
        assert_eq!(
            p.url("gpt-test"),
            "https://example.openai.azure.com/openai/deployments/gpt-test/chat/completions?api-version=2024-06-01"
        );
    }

    #[test]
    fn test_name_and_capabilities() {
        let p = provider();
        assert_eq!(p.name(), "openai_chat");
        assert!(p.supports_tools());
        assert_eq!(p.list_models().len(), 1);
        assert_eq!(p.list_models()[0].id, "gpt-test");
    }

    #[test]
    fn test_convert_messages_roles() {
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::tool("call_1", "output"),
        ];
        let wire = OpenAiChatProvider::convert_messages(&messages);

        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0].role, "system");
        assert_eq!(wire[1].role, "user");
        assert_eq!(wire[2].role, "assistant");
        assert_eq!(wire[3].role, "tool");
        assert_eq!(wire[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_convert_messages_tool_calls() {
        let messages = vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::new("c1", "read_file", "{\"path\":\"a\"}")],
        )];
        let wire = OpenAiChatProvider::convert_messages(&messages);

        // Empty content on a tool-call message is omitted on the wire.
        assert!(wire[0].content.is_none());
        let calls = wire[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "c1");
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.arguments, "{\"path\":\"a\"}");
    }

    #[test]
    fn test_build_request_omits_empty_tools() {
        let request =
            OpenAiChatProvider::build_request(&[Message::user("x")], &ChatOptions::new("m"), false);
        assert!(request.tools.is_none());
        assert!(!request.stream);
    }

    #[test]
    fn test_build_request_serialization() {
        let options = ChatOptions::new("m").with_temperature(0.1).with_max_tokens(64);
        let request = OpenAiChatProvider::build_request(&[Message::user("x")], &options, true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 64);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_parse_stream_data_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk = parse_stream_data(data).unwrap();
        assert_eq!(chunk.delta.content.as_deref(), Some("Hel"));
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn test_parse_stream_data_tool_call_fragment() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read_file","arguments":""}}]}}]}"#;
        let chunk = parse_stream_data(data).unwrap();
        assert_eq!(chunk.delta.tool_calls.len(), 1);
        let frag = &chunk.delta.tool_calls[0];
        assert_eq!(frag.index, 0);
        assert_eq!(frag.id.as_deref(), Some("call_1"));
        assert_eq!(frag.name.as_deref(), Some("read_file"));
    }

    #[test]
    fn test_parse_stream_data_arguments_fragment() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"pa"}}]}}]}"#;
        let chunk = parse_stream_data(data).unwrap();
        assert_eq!(chunk.delta.tool_calls[0].arguments.as_deref(), Some("{\"pa"));
        assert!(chunk.delta.tool_calls[0].id.is_none());
    }

    #[test]
    fn test_parse_stream_data_finish_reason() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#;
        let chunk = parse_stream_data(data).unwrap();
        assert_eq!(chunk.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn test_parse_stream_data_invalid_json() {
        assert!(parse_stream_data("{not json").is_none());
    }

    #[test]
    fn test_parse_stream_data_empty_choices() {
        assert!(parse_stream_data(r#"{"choices":[]}"#).is_none());
    }

    #[test]
    fn test_convert_tools_flattened_under_function() {
        use crate::llm::provider::ToolInputSchema;

        let tools = vec![ToolDefinition {
            name: "glob_find".to_string(),
            description: "Find files".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: serde_json::json!({"pattern": {"type": "string"}}),
                required: vec!["pattern".to_string()],
            },
        }];
        let wire = OpenAiChatProvider::convert_tools(&tools);
        assert_eq!(wire[0].tool_type, "function");
        assert_eq!(wire[0].function.name, "glob_find");
        assert_eq!(wire[0].function.parameters["type"], "object");
    }
}
