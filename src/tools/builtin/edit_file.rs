// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! File edit tool
//!
//! Edits existing files by exact string replacement. An ambiguous target
//! (multiple matches without `replace_all`) is a tool error so the model can
//! retry with a more specific string.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// How many unchanged lines to show around the edit site.
const DIFF_CONTEXT_LINES: usize = 3;

/// Tool for editing existing files
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "edit_file".to_string(),
            description:
                "Edit an existing file by replacing an exact string with new content. \
                 old_string must match exactly, including whitespace. Fails when the \
                 string matches more than once unless replace_all is set."
                    .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "The path to the file to edit", true)
                .string("old_string", "The exact string to find", true)
                .string("new_string", "The replacement string", true)
                .boolean(
                    "replace_all",
                    "Replace every occurrence instead of requiring a unique match",
                    false,
                )
                .build(),
        }
    }

    async fn execute(
        &self,
        tool_call_id: String,
        input: Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let path_str = input["path"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("path is required".to_string()))?;
        let old_string = input["old_string"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("old_string is required".to_string()))?;
        let new_string = input["new_string"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("new_string is required".to_string()))?;
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        if old_string.is_empty() {
            return Ok(ToolResult::error(tool_call_id, "old_string must not be empty"));
        }

        let path = context.resolve(path_str);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Failed to read {}: {}", path.display(), e),
                ));
            }
        };

        let occurrences = count_non_overlapping(&content, old_string);

        if occurrences == 0 {
            return Ok(ToolResult::error(
                tool_call_id,
                "String not found in file. old_string must match exactly, including whitespace.",
            ));
        }

        if occurrences > 1 && !replace_all {
            return Ok(ToolResult::error(
                tool_call_id,
                format!(
                    "old_string matches {} locations. Provide a more specific string or set replace_all=true.",
                    occurrences
                ),
            ));
        }

        let new_content = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        if let Err(e) = std::fs::write(&path, &new_content) {
            return Ok(ToolResult::error(
                tool_call_id,
                format!("Failed to write {}: {}", path.display(), e),
            ));
        }

        let replaced = if replace_all { occurrences } else { 1 };
        let line_delta = new_content.lines().count() as i64 - content.lines().count() as i64;
        let delta_str = match line_delta {
            0 => "no line change".to_string(),
            d if d > 0 => format!("+{} lines", d),
            d => format!("{} lines", d),
        };

        let diff = context_diff(&content, &new_content, old_string, new_string);

        Ok(ToolResult::success(
            tool_call_id,
            format!(
                "Edited {} (replaced {} occurrence{}, {})\n{}",
                path.display(),
                replaced,
                if replaced == 1 { "" } else { "s" },
                delta_str,
                diff
            ),
        ))
    }
}

/// Count non-overlapping occurrences, matching what `str::replace` does.
fn count_non_overlapping(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Render a small diff around the first replacement site.
fn context_diff(old_content: &str, new_content: &str, old_string: &str, new_string: &str) -> String {
    let Some(pos) = old_content.find(old_string) else {
        return String::new();
    };

    let old_lines: Vec<&str> = old_content.lines().collect();
    let new_lines: Vec<&str> = new_content.lines().collect();

    let first_line = old_content[..pos].matches('\n').count();
    let old_span = old_string.matches('\n').count() + 1;
    let new_span = new_string.matches('\n').count() + 1;

    let start = first_line.saturating_sub(DIFF_CONTEXT_LINES);
    let mut out = String::new();

    for line in old_lines.iter().take(first_line).skip(start) {
        out.push_str(&format!("  {}\n", line));
    }
    for line in old_lines.iter().take(first_line + old_span).skip(first_line) {
        out.push_str(&format!("- {}\n", line));
    }
    for line in new_lines.iter().take(first_line + new_span).skip(first_line) {
        out.push_str(&format!("+ {}\n", line));
    }
    let tail_start = first_line + new_span;
    let tail_end = (tail_start + DIFF_CONTEXT_LINES).min(new_lines.len());
    for line in new_lines.iter().take(tail_end).skip(tail_start) {
        out.push_str(&format!("  {}\n", line));
    }

    out
}
