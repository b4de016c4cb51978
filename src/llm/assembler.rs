// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Incremental tool-call reassembly
//!
//! Providers stream tool calls as fragments keyed by an adapter-normalized
//! index. The assembler buckets fragments by the order their index first
//! appears, concatenates name and argument fragments, and fixes the id from
//! the first non-empty fragment. Only fully assembled calls survive
//! `finish()`.

use crate::llm::message::ToolCall;
use crate::llm::provider::ToolCallDelta;

#[derive(Debug, Default)]
struct PartialToolCall {
    wire_index: usize,
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates tool-call fragments across stream chunks.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    // Ordered by first appearance of each wire index.
    partials: Vec<PartialToolCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the matching partial call.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let position = match self.partials.iter().position(|p| p.wire_index == delta.index) {
            Some(position) => position,
            None => {
                self.partials.push(PartialToolCall {
                    wire_index: delta.index,
                    ..Default::default()
                });
                self.partials.len() - 1
            }
        };
        let slot = &mut self.partials[position];

        if slot.id.is_empty() {
            if let Some(id) = delta.id.as_deref() {
                if !id.is_empty() {
                    slot.id = id.to_string();
                }
            }
        }
        if let Some(name) = delta.name.as_deref() {
            slot.name.push_str(name);
        }
        if let Some(arguments) = delta.arguments.as_deref() {
            slot.arguments.push_str(arguments);
        }
    }

    /// Whether any fragments have been seen.
    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Consume the assembler, yielding fully assembled calls in
    /// first-appearance order.
    pub fn finish(self) -> Vec<ToolCall> {
        self.partials
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| ToolCall::new(p.id, p.name, p.arguments))
            .collect()
    }
}
