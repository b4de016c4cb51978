// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Content search tool
//!
//! Prefers ripgrep, falling back to system grep when rg is not installed.
//! Output is capped so huge result sets do not flood the conversation.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// Per-file match cap passed to ripgrep.
const MAX_COUNT: &str = "500";
/// Total output lines returned to the model.
const MAX_OUTPUT_LINES: usize = 200;

/// Tool for searching file contents
pub struct GrepSearchTool;

impl GrepSearchTool {
    async fn run_ripgrep(
        pattern: &str,
        path: &std::path::Path,
        include: Option<&str>,
    ) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("rg");
        cmd.arg("--line-number").arg("--max-count").arg(MAX_COUNT);
        if let Some(glob) = include {
            cmd.arg("--glob").arg(glob);
        }
        cmd.arg(pattern)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.output().await
    }

    async fn run_grep(
        pattern: &str,
        path: &std::path::Path,
        include: Option<&str>,
    ) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("grep");
        cmd.arg("-rn");
        if let Some(glob) = include {
            cmd.arg(format!("--include={}", glob));
        }
        cmd.arg(pattern)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.output().await
    }
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "grep_search".to_string(),
            description:
                "Search file contents for a pattern using ripgrep. Returns matching lines \
                 with file names and line numbers."
                    .to_string(),
            input_schema: SchemaBuilder::new()
                .string("pattern", "The pattern to search for", true)
                .string("path", "Directory or file to search (default: working directory)", false)
                .string("include", "Only search files matching this glob, e.g. *.rs", false)
                .build(),
        }
    }

    async fn execute(
        &self,
        tool_call_id: String,
        input: Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let pattern = input["pattern"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("pattern is required".to_string()))?;
        if pattern.is_empty() {
            return Ok(ToolResult::error(tool_call_id, "pattern must not be empty"));
        }

        let path = input["path"]
            .as_str()
            .map(|p| context.resolve(p))
            .unwrap_or_else(|| context.working_directory.clone());
        let include = input["include"].as_str();

        let output = match Self::run_ripgrep(pattern, &path, include).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("ripgrep unavailable ({}), falling back to grep", e);
                match Self::run_grep(pattern, &path, include).await {
                    Ok(output) => output,
                    Err(e) => {
                        return Ok(ToolResult::error(
                            tool_call_id,
                            format!("Failed to run search: {}", e),
                        ));
                    }
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();

        if lines.is_empty() {
            return Ok(ToolResult::success(tool_call_id, "No matches found"));
        }

        let text = if lines.len() > MAX_OUTPUT_LINES {
            let mut text = format!(
                "[{} matching lines, showing first {}]\n",
                lines.len(),
                MAX_OUTPUT_LINES
            );
            text.push_str(&lines[..MAX_OUTPUT_LINES].join("\n"));
            text
        } else {
            lines.join("\n")
        };

        Ok(ToolResult::success(tool_call_id, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> ToolContext {
        ToolContext::new(dir.path().to_path_buf())
    }

    #[test]
    fn test_tool_name() {
        assert_eq!(GrepSearchTool.name(), "grep_search");
    }

    #[tokio::test]
    async fn test_finds_matches_with_line_numbers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("code.rs"),
            "fn main() {\n    needle();\n}\n",
        )
        .unwrap();

        let result = GrepSearchTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "needle"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert!(!result.is_error());
        assert!(result.output_text().contains("needle"));
        assert!(result.output_text().contains("2"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here").unwrap();

        let result = GrepSearchTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "zzz_absent"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert_eq!(result.output_text(), "No matches found");
    }

    #[tokio::test]
    async fn test_empty_pattern_is_tool_error() {
        let dir = TempDir::new().unwrap();

        let result = GrepSearchTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": ""}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_include_filter() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "needle in rust").unwrap();
        std::fs::write(dir.path().join("a.md"), "needle in markdown").unwrap();

        let result = GrepSearchTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "needle", "include": "*.rs"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert!(result.output_text().contains("a.rs"));
        assert!(!result.output_text().contains("a.md"));
    }

    #[tokio::test]
    async fn test_output_capped_with_header() {
        let dir = TempDir::new().unwrap();
        let many: String = (0..400).map(|i| format!("match line {}\n", i)).collect();
        std::fs::write(dir.path().join("big.txt"), many).unwrap();

        let result = GrepSearchTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "match"}),
                &context(&dir),
            )
            .await
            .unwrap();

        let text = result.output_text();
        assert!(text.starts_with("["));
        assert!(text.contains("showing first 200"));
        assert!(text.lines().count() <= MAX_OUTPUT_LINES + 1);
    }

    #[tokio::test]
    async fn test_missing_pattern_argument() {
        let dir = TempDir::new().unwrap();
        let result = GrepSearchTool
            .execute("t1".to_string(), serde_json::json!({}), &context(&dir))
            .await;
        assert!(result.is_err());
    }
}
