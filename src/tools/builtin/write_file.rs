// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! File write tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// Tool for creating or overwriting files
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description:
                "Create a new file or overwrite an existing one with the given content. \
                 Parent directories are created as needed."
                    .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "The path of the file to write", true)
                .string("content", "The full content to write", true)
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
        let content = input["content"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("content is required".to_string()))?;

        let path = context.resolve(path_str);

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Failed to create directory {}: {}", parent.display(), e),
                ));
            }
        }

        match std::fs::write(&path, content) {
            Ok(()) => {
                let lines = content.lines().count();
                Ok(ToolResult::success(
                    tool_call_id,
                    format!("Wrote {} lines to {}", lines, path.display()),
                ))
            }
            Err(e) => Ok(ToolResult::error(
                tool_call_id,
                format!("Failed to write {}: {}", path.display(), e),
            )),
        }
    }
}
