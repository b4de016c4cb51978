// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Mock chat provider for testing
//!
//! A configurable implementation of the ChatProvider trait usable in unit
//! and integration tests without network access. Responses are scripted per
//! turn; streaming replays the same turn as synthesized chunks so the
//! streaming and non-streaming paths can be compared directly.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ApiError, CaretError, Result};
use crate::llm::message::{Message, ToolCall};
use crate::llm::provider::{
    ChatCompletion, ChatOptions, ChatProvider, ChatStream, FinishReason, ModelInfo, StreamChunk,
    ToolCallDelta,
};

/// A pre-configured turn for the mock provider
#[derive(Clone, Debug, Default)]
pub struct MockTurn {
    /// Text content to return
    pub text: String,
    /// Tool calls to return
    pub tool_calls: Vec<ToolCall>,
    /// Explicit stream chunks; synthesized from text/tool_calls when empty
    pub chunks: Vec<StreamChunk>,
}

impl MockTurn {
    /// A plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A reply carrying one tool call.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            tool_calls: vec![ToolCall::new(id, name, arguments)],
            ..Default::default()
        }
    }

    /// Add another tool call to this turn.
    pub fn and_tool_call(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        self.tool_calls.push(ToolCall::new(id, name, arguments));
        self
    }

    /// Replace the synthesized stream with explicit chunks.
    pub fn with_chunks(mut self, chunks: Vec<StreamChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    fn finish_reason(&self) -> FinishReason {
        if self.tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        }
    }

    /// Synthesize a chunk sequence equivalent to this turn.
    ///
    /// Arguments are split in half so reassembly across fragments is
    /// exercised by every streaming test.
    fn synthesize_chunks(&self) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        if !self.text.is_empty() {
            chunks.push(StreamChunk::text(self.text.clone()));
        }
        for (index, call) in self.tool_calls.iter().enumerate() {
            chunks.push(StreamChunk::tool_fragment(ToolCallDelta {
                index,
                id: Some(call.id.clone()),
                name: Some(call.function.name.clone()),
                arguments: None,
            }));
            let arguments = &call.function.arguments;
            let mut split = arguments.len() / 2;
            while !arguments.is_char_boundary(split) {
                split -= 1;
            }
            let (head, tail) = arguments.split_at(split);
            if !head.is_empty() {
                chunks.push(StreamChunk::tool_fragment(ToolCallDelta {
                    index,
                    id: None,
                    name: None,
                    arguments: Some(head.to_string()),
                }));
            }
            chunks.push(StreamChunk::tool_fragment(ToolCallDelta {
                index,
                id: None,
                name: None,
                arguments: Some(tail.to_string()),
            }));
        }
        chunks.push(StreamChunk::finish(self.finish_reason()));
        chunks
    }
}

type TurnFactory = dyn Fn(usize) -> MockTurn + Send + Sync;

/// A mock chat provider for testing
#[derive(Clone)]
pub struct MockProvider {
    turns: Arc<Mutex<Vec<MockTurn>>>,
    factory: Option<Arc<TurnFactory>>,
    call_count: Arc<AtomicUsize>,
    recorded_messages: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Provider scripted with a fixed list of turns.
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns)),
            factory: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Provider generating a fresh turn per call from a factory.
    pub fn from_factory(factory: impl Fn(usize) -> MockTurn + Send + Sync + 'static) -> Self {
        Self {
            turns: Arc::new(Mutex::new(Vec::new())),
            factory: Some(Arc::new(factory)),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Message lists the provider was called with.
    pub fn recorded_messages(&self) -> Vec<Vec<Message>> {
        self.recorded_messages.lock().unwrap().clone()
    }

    fn next_turn(&self, messages: &[Message]) -> Result<MockTurn> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.recorded_messages
            .lock()
            .unwrap()
            .push(messages.to_vec());

        if let Some(factory) = &self.factory {
            return Ok(factory(call));
        }

        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            return Err(CaretError::Api(ApiError::InvalidResponse(
                "mock script exhausted".to_string(),
            )));
        }
        Ok(turns.remove(0))
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::with_description("mock-model", "scripted responses")]
    }

    async fn create_chat_completion(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<ChatCompletion> {
        let turn = self.next_turn(messages)?;
        let finish_reason = turn.finish_reason();
        Ok(ChatCompletion {
            message: Message::assistant_with_tool_calls(turn.text, turn.tool_calls),
            usage: None,
            finish_reason,
        })
    }

    async fn create_streaming_chat_completion(
        &self,
        messages: &[Message],
        _options: &ChatOptions,
    ) -> Result<ChatStream> {
        let turn = self.next_turn(messages)?;
        let chunks = if turn.chunks.is_empty() {
            turn.synthesize_chunks()
        } else {
            turn.chunks
        };
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripted_turns_in_order() {
        let provider = MockProvider::new(vec![MockTurn::text("one"), MockTurn::text("two")]);
        let options = ChatOptions::new("mock-model");

        let first = provider
            .create_chat_completion(&[Message::user("a")], &options)
            .await
            .unwrap();
        let second = provider
            .create_chat_completion(&[Message::user("b")], &options)
            .await
            .unwrap();

        assert_eq!(first.message.content, "one");
        assert_eq!(second.message.content, "two");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_errors() {
        let provider = MockProvider::new(vec![]);
        let result = provider
            .create_chat_completion(&[Message::user("a")], &ChatOptions::new("m"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_factory_turns() {
        let provider = MockProvider::from_factory(|call| {
            MockTurn::tool_call(format!("call_{}", call), "read_file", "{}")
        });
        let options = ChatOptions::new("m");

        for expected in 0..3 {
            let completion = provider
                .create_chat_completion(&[Message::user("x")], &options)
                .await
                .unwrap();
            assert_eq!(
                completion.message.tool_calls()[0].id,
                format!("call_{}", expected)
            );
        }
    }

    #[tokio::test]
    async fn test_tool_call_turn_finish_reason() {
        let provider = MockProvider::new(vec![MockTurn::tool_call("c1", "read_file", "{}")]);
        let completion = provider
            .create_chat_completion(&[Message::user("x")], &ChatOptions::new("m"))
            .await
            .unwrap();
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert!(completion.message.has_tool_calls());
    }

    #[tokio::test]
    async fn test_streaming_synthesizes_fragments() {
        let provider = MockProvider::new(vec![MockTurn::text("hi").and_tool_call(
            "c1",
            "exec_shell",
            r#"{"command":"ls"}"#,
        )]);
        let stream = provider
            .create_streaming_chat_completion(&[Message::user("x")], &ChatOptions::new("m"))
            .await
            .unwrap();

        let chunks: Vec<StreamChunk> = stream.map(|c| c.unwrap()).collect().await;
        // text + id/name fragment + two argument fragments + finish
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].delta.content.as_deref(), Some("hi"));
        assert_eq!(
            chunks.last().unwrap().finish_reason,
            Some(FinishReason::ToolCalls)
        );
    }

    #[tokio::test]
    async fn test_recorded_messages() {
        let provider = MockProvider::new(vec![MockTurn::text("ok")]);
        provider
            .create_chat_completion(
                &[Message::system("s"), Message::user("u")],
                &ChatOptions::new("m"),
            )
            .await
            .unwrap();

        let recorded = provider.recorded_messages();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), 2);
    }
}
