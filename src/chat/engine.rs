// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! The agent loop
//!
//! Bounded iteration interleaving model turns with tool execution. The full
//! tool-definition set is always sent; permission gating happens after the
//! model chooses, so denials surface as normal tool results the model can
//! react to. Tool errors become tool results too and never abort the loop;
//! provider errors terminate the current turn.

use futures::StreamExt;
use serde_json::Value;
use std::time::Instant;

use crate::chat::streaming::StreamAccumulator;
use crate::error::Result;
use crate::llm::message::Message;
use crate::llm::provider::{ChatOptions, ChatProvider};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};

/// Hard cap on model turns per user request.
pub const MAX_ITERATIONS: usize = 20;

/// Final content when the cap is hit.
pub const ITERATION_LIMIT_MESSAGE: &str = "[Agent reached maximum iteration limit]";

/// Tools that require a permission decision before execution.
pub const GATED_TOOLS: &[&str] = &["write_file", "edit_file", "exec_shell"];

/// Fixed system prompt prepended to every conversation.
pub const SYSTEM_PROMPT: &str = "\
You are CaretForge, an AI coding agent running in the user's terminal. You \
help with software engineering tasks: reading and editing code, running \
commands, and answering questions about the project.

You can call these tools: read_file, write_file, edit_file, exec_shell, \
grep_search, glob_find. Prefer reading files before editing them, make the \
smallest change that solves the task, and report what you did. When a tool \
result is an error, adjust your approach instead of repeating the same call. \
Some calls need user approval; if one is denied, continue without it.";

/// Callbacks fired as the loop progresses
pub trait AgentObserver {
    /// A streamed text token arrived.
    fn on_token(&mut self, text: &str) -> Result<()>;

    /// The model requested a tool call (after argument parsing).
    fn on_tool_call(&mut self, name: &str, args: &Value) -> Result<()>;

    /// A tool finished and its result was appended.
    fn on_tool_result(&mut self, name: &str, result: &ToolResult) -> Result<()>;

    /// Decide whether a gated tool call may run.
    fn on_permission_request(&mut self, name: &str, args: &Value) -> bool;
}

/// What the loop returns
#[derive(Debug)]
pub struct AgentOutcome {
    /// The full conversation, system message included
    pub conversation: Vec<Message>,
    /// The final assistant text
    pub final_content: String,
    /// How many tool calls the model emitted
    pub tool_call_count: usize,
    /// Wall-clock duration of the whole loop
    pub duration_ms: u64,
}

/// Run the agent loop over a conversation prefix (without the system
/// message).
pub async fn run_agent_loop(
    provider: &dyn ChatProvider,
    model: &str,
    prefix: &[Message],
    registry: &ToolRegistry,
    context: &ToolContext,
    stream: bool,
    observer: &mut dyn AgentObserver,
) -> Result<AgentOutcome> {
    let started = Instant::now();

    let mut conversation = Vec::with_capacity(prefix.len() + 1);
    conversation.push(Message::system(SYSTEM_PROMPT));
    conversation.extend_from_slice(prefix);

    let mut tool_call_count = 0usize;
    let definitions = registry.definitions();

    for _ in 0..MAX_ITERATIONS {
        let options = ChatOptions::new(model)
            .with_stream(stream)
            .with_tools(definitions.clone());

        let assistant = if stream {
            let mut chunk_stream = provider
                .create_streaming_chat_completion(&conversation, &options)
                .await?;
            let mut accumulator = StreamAccumulator::new();
            while let Some(chunk) = chunk_stream.next().await {
                if let Some(text) = accumulator.apply(&chunk?) {
                    observer.on_token(&text)?;
                }
            }
            accumulator.finish()
        } else {
            provider
                .create_chat_completion(&conversation, &options)
                .await?
                .message
        };

        conversation.push(assistant.clone());

        if !assistant.has_tool_calls() {
            return Ok(AgentOutcome {
                final_content: assistant.content,
                conversation,
                tool_call_count,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        for call in assistant.tool_calls() {
            let name = call.function.name.as_str();
            // The tool validates its own arguments; malformed JSON from the
            // model becomes an empty object, not a transport error.
            let args: Value = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

            tool_call_count += 1;
            observer.on_tool_call(name, &args)?;

            if GATED_TOOLS.contains(&name) && !observer.on_permission_request(name, &args) {
                conversation.push(Message::tool(call.id.clone(), "Permission denied by user."));
                continue;
            }

            let result = match registry.get(name) {
                Some(tool) => match tool.execute(call.id.clone(), args, context).await {
                    Ok(result) => result,
                    Err(e) => ToolResult::error(call.id.clone(), e.to_string()),
                },
                None => ToolResult::error(call.id.clone(), format!("Unknown tool: {}", name)),
            };

            conversation.push(Message::tool(call.id.clone(), result.output_text()));
            observer.on_tool_result(name, &result)?;
        }
    }

    Ok(AgentOutcome {
        final_content: ITERATION_LIMIT_MESSAGE.to_string(),
        conversation,
        tool_call_count,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}
