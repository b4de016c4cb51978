// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Asynchronous thread/run provider
//!
//! Creates a thread and run in one POST, then polls the run until a terminal
//! status (exponential backoff 500 ms to 5 s, 120 s ceiling) and fetches the
//! newest assistant message. Tools are handled server-side: this adapter
//! reports `supports_tools` = false and fails if a run lands in
//! `requires_action`. Authentication is either an `api-key` header or a
//! bearer token acquired by spawning the `az` CLI, cached in memory for one
//! hour minus a safety margin.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::{ApiError, CaretError, Result};
use crate::llm::message::{Message, Role};
use crate::llm::provider::{
    ChatCompletion, ChatOptions, ChatProvider, ChatStream, FinishReason, ModelInfo, StreamChunk,
};
use crate::llm::providers::status_error;
use crate::llm::sse::{sse_stream, SseEvent};

const POLL_INITIAL: Duration = Duration::from_millis(500);
const POLL_MAX: Duration = Duration::from_secs(5);
const POLL_CEILING: Duration = Duration::from_secs(120);
const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// How the adapter authenticates.
pub enum ThreadRunAuth {
    /// Static `api-key` header
    ApiKey(String),
    /// Bearer token from `az account get-access-token`
    CliCredential,
}

struct CachedToken {
    token: String,
    acquired_at: Instant,
}

/// Asynchronous thread/run provider
pub struct ThreadRunProvider {
    client: Client,
    endpoint: String,
    auth: ThreadRunAuth,
    models: Vec<String>,
    token_cache: Mutex<Option<CachedToken>>,
}

impl ThreadRunProvider {
    /// Create a new provider for an endpoint and model list.
    pub fn new(endpoint: impl Into<String>, auth: ThreadRunAuth, models: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            auth,
            models,
            token_cache: Mutex::new(None),
        }
    }

    fn runs_url(&self) -> String {
        format!("{}/threads/runs", self.endpoint)
    }

    fn run_url(&self, thread_id: &str, run_id: &str) -> String {
        format!("{}/threads/{}/runs/{}", self.endpoint, thread_id, run_id)
    }

    fn messages_url(&self, thread_id: &str) -> String {
        format!(
            "{}/threads/{}/messages?order=desc&limit=10",
            self.endpoint, thread_id
        )
    }

    /// Resolve the auth header, spawning the CLI when the cache is cold.
    async fn auth_header(&self) -> Result<(&'static str, String)> {
        match &self.auth {
            ThreadRunAuth::ApiKey(key) => Ok(("api-key", key.clone())),
            ThreadRunAuth::CliCredential => {
                let mut cache = self.token_cache.lock().await;
                let expired = match cache.as_ref() {
                    Some(cached) => {
                        cached.acquired_at.elapsed() >= TOKEN_LIFETIME - TOKEN_SAFETY_MARGIN
                    }
                    None => true,
                };
                if expired {
                    let token = Self::fetch_cli_token().await?;
                    tracing::debug!("refreshed CLI access token");
                    *cache = Some(CachedToken {
                        token,
                        acquired_at: Instant::now(),
                    });
                }
                let token = cache.as_ref().map(|c| c.token.clone()).unwrap_or_default();
                Ok(("authorization", format!("Bearer {}", token)))
            }
        }
    }

    /// Spawn `az account get-access-token` and pull the token out of its
    /// JSON output.
    async fn fetch_cli_token() -> Result<String> {
        let output = tokio::process::Command::new("az")
            .args(["account", "get-access-token"])
            .output()
            .await
            .map_err(|e| {
                CaretError::Api(ApiError::AuthenticationFailed(format!(
                    "failed to spawn az CLI: {}",
                    e
                )))
            })?;

        if !output.status.success() {
            return Err(CaretError::Api(ApiError::AuthenticationFailed(format!(
                "az CLI exited with {}",
                output.status
            ))));
        }

        let parsed: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(|e| {
                CaretError::Api(ApiError::AuthenticationFailed(format!(
                    "unreadable az CLI output: {}",
                    e
                )))
            })?;

        parsed["accessToken"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                CaretError::Api(ApiError::AuthenticationFailed(
                    "az CLI output had no accessToken".to_string(),
                ))
            })
    }

    fn build_request(messages: &[Message], options: &ChatOptions, stream: bool) -> WireRunRequest {
        let instructions = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        let thread_messages = messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| WireThreadMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        WireRunRequest {
            model: options.model.clone(),
            instructions,
            thread: WireThread {
                messages: thread_messages,
            },
            stream,
        }
    }

    async fn post_run(
        &self,
        messages: &[Message],
        options: &ChatOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let (header, value) = self.auth_header().await?;
        let body = Self::build_request(messages, options, stream);
        let response = self
            .client
            .post(self.runs_url())
            .header(header, value)
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

    /// Poll the run until it reaches a terminal status.
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let started = Instant::now();
        let mut interval = POLL_INITIAL;

        loop {
            if started.elapsed() > POLL_CEILING {
                return Err(CaretError::Api(ApiError::Timeout(format!(
                    "run {} did not complete within {} s",
                    run_id,
                    POLL_CEILING.as_secs()
                ))));
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(POLL_MAX);

            let (header, value) = self.auth_header().await?;
            let response = self
                .client
                .get(self.run_url(thread_id, run_id))
                .header(header, value)
                .send()
                .await
                .map_err(|e| CaretError::Api(ApiError::Network(e.to_string())))?;

            let status_code = response.status().as_u16();
            if !response.status().is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status_code, &body));
            }

            let run: WireRun = response
                .json()
                .await
                .map_err(|e| CaretError::Api(ApiError::InvalidResponse(e.to_string())))?;

            match run.status.as_str() {
                "completed" => return Ok(()),
                "requires_action" => {
                    return Err(CaretError::Api(ApiError::Unsupported(
                        "run requires client-side function calling".to_string(),
                    )))
                }
                "failed" | "cancelled" | "expired" | "incomplete" => {
                    return Err(CaretError::Api(ApiError::ServerError {
                        status: status_code,
                        message: format!("run ended with status '{}'", run.status),
                    }))
                }
                // queued, in_progress, cancelling
                _ => continue,
            }
        }
    }

    /// Fetch the newest assistant message's concatenated text parts.
    async fn fetch_reply(&self, thread_id: &str) -> Result<String> {
        let (header, value) = self.auth_header().await?;
        let response = self
            .client
            .get(self.messages_url(thread_id))
            .header(header, value)
            .send()
            .await
            .map_err(|e| CaretError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let listing: WireMessageList = response
            .json()
            .await
            .map_err(|e| CaretError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let reply = listing
            .data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(|m| {
                m.content
                    .into_iter()
                    .filter_map(|part| part.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| {
                CaretError::Api(ApiError::InvalidResponse(
                    "thread had no assistant message".to_string(),
                ))
            })?;

        Ok(reply)
    }
}

#[async_trait]
impl ChatProvider for ThreadRunProvider {
    fn name(&self) -> &str {
        "thread_run"
    }

    /// Tools run server-side; client-side definitions are not accepted.
    fn supports_tools(&self) -> bool {
        false
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.models.iter().map(ModelInfo::new).collect()
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatCompletion> {
        let response = self.post_run(messages, options, false).await?;
        let run: WireRun = response
            .json()
            .await
            .map_err(|e| CaretError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let thread_id = run.thread_id.clone().ok_or_else(|| {
            CaretError::Api(ApiError::InvalidResponse("run had no thread_id".to_string()))
        })?;

        self.wait_for_run(&thread_id, &run.id).await?;
        let reply = self.fetch_reply(&thread_id).await?;

        Ok(ChatCompletion {
            message: Message::assistant(reply),
            usage: None,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<ChatStream> {
        let response = self.post_run(messages, options, true).await?;

        let chunks = sse_stream(response).filter_map(|event| async move {
            match event {
                Ok(event) => map_stream_event(&event),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(chunks))
    }
}

/// Map one typed thread event onto a canonical chunk.
fn map_stream_event(event: &SseEvent) -> Option<Result<StreamChunk>> {
    let event_type = event.event.as_deref()?;
    match event_type {
        "thread.message.delta" => {
            let parsed: serde_json::Value = match serde_json::from_str(&event.data) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("skipping unparseable thread event: {}", e);
                    return None;
                }
            };
            let text: String = parsed["delta"]["content"]
                .as_array()?
                .iter()
                .filter_map(|part| part["text"]["value"].as_str())
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(Ok(StreamChunk::text(text)))
            }
        }
        "thread.run.completed" => Some(Ok(StreamChunk::finish(FinishReason::Stop))),
        "thread.run.failed" => Some(Err(CaretError::Api(ApiError::ServerError {
            status: 0,
            message: format!("run failed: {}", event.data),
        }))),
        _ => None,
    }
}

// Thread/run wire types

#[derive(Debug, Serialize)]
struct WireRunRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    thread: WireThread,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireThread {
    messages: Vec<WireThreadMessage>,
}

#[derive(Debug, Serialize)]
struct WireThreadMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct WireMessageList {
    #[serde(default)]
    data: Vec<WireListedMessage>,
}

#[derive(Debug, Deserialize)]
struct WireListedMessage {
    role: String,
    #[serde(default)]
    content: Vec<WireMessagePart>,
}

#[derive(Debug, Deserialize)]
struct WireMessagePart {
    #[serde(default)]
    text: Option<WireTextValue>,
}

#[derive(Debug, Deserialize)]
struct WireTextValue {
    value: String,
}
