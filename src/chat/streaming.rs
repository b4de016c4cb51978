// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Streaming response accumulation
//!
//! Folds a provider chunk stream into the final assistant message: text
//! deltas concatenate, tool-call fragments go through the assembler, and the
//! finish reason is taken from the terminal chunk. Only fully reassembled
//! tool calls appear on the returned message.

use crate::llm::assembler::ToolCallAssembler;
use crate::llm::message::Message;
use crate::llm::provider::{FinishReason, StreamChunk};

/// Accumulator for one streaming response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    assembler: ToolCallAssembler,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in, returning the text delta to forward, if any.
    pub fn apply(&mut self, chunk: &StreamChunk) -> Option<String> {
        for fragment in &chunk.delta.tool_calls {
            self.assembler.apply(fragment);
        }
        if let Some(reason) = chunk.finish_reason {
            self.finish_reason = Some(reason);
        }
        match chunk.delta.content.as_deref() {
            Some(text) if !text.is_empty() => {
                self.text.push_str(text);
                Some(text.to_string())
            }
            _ => None,
        }
    }

    /// The finish reason seen so far.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Consume the accumulator into the final assistant message.
    pub fn finish(self) -> Message {
        Message::assistant_with_tool_calls(self.text, self.assembler.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ToolCallDelta;

    #[test]
    fn test_text_accumulation() {
        let mut acc = StreamAccumulator::new();

        assert_eq!(acc.apply(&StreamChunk::text("Hel")).as_deref(), Some("Hel"));
        assert_eq!(acc.apply(&StreamChunk::text("lo")).as_deref(), Some("lo"));
        assert!(acc.apply(&StreamChunk::finish(FinishReason::Stop)).is_none());

        let message = acc.finish();
        assert_eq!(message.content, "Hello");
        assert!(!message.has_tool_calls());
    }

    #[test]
    fn test_tool_call_assembly() {
        let mut acc = StreamAccumulator::new();

        acc.apply(&StreamChunk::tool_fragment(ToolCallDelta {
            index: 0,
            id: Some("call_1".to_string()),
            name: Some("read_file".to_string()),
            arguments: None,
        }));
        acc.apply(&StreamChunk::tool_fragment(ToolCallDelta {
            index: 0,
            id: None,
            name: None,
            arguments: Some("{\"path\":".to_string()),
        }));
        acc.apply(&StreamChunk::tool_fragment(ToolCallDelta {
            index: 0,
            id: None,
            name: None,
            arguments: Some("\"a.txt\"}".to_string()),
        }));
        acc.apply(&StreamChunk::finish(FinishReason::ToolCalls));

        assert_eq!(acc.finish_reason(), Some(FinishReason::ToolCalls));
        let message = acc.finish();
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.arguments, "{\"path\":\"a.txt\"}");
    }

    #[test]
    fn test_mixed_text_and_tools() {
        let mut acc = StreamAccumulator::new();
        acc.apply(&StreamChunk::text("let me check"));
        acc.apply(&StreamChunk::tool_fragment(ToolCallDelta {
            index: 0,
            id: Some("c".to_string()),
            name: Some("glob_find".to_string()),
            arguments: Some("{}".to_string()),
        }));

        let message = acc.finish();
        assert_eq!(message.content, "let me check");
        assert_eq!(message.tool_calls().len(), 1);
    }

    #[test]
    fn test_empty_content_not_forwarded() {
        let mut acc = StreamAccumulator::new();
        let chunk = StreamChunk {
            delta: crate::llm::provider::StreamDelta {
                content: Some(String::new()),
                ..Default::default()
            },
            finish_reason: None,
        };
        assert!(acc.apply(&chunk).is_none());
    }
}
