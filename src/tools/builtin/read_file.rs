// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! File read tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// Tool for reading file contents. Always allowed by the permission layer.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the entire contents of a file as UTF-8 text.".to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "The path to the file to read", true)
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
        let path = context.resolve(path_str);

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(ToolResult::success(tool_call_id, content)),
            Err(e) => Ok(ToolResult::error(
                tool_call_id,
                format!("Failed to read {}: {}", path.display(), e),
            )),
        }
    }
}
