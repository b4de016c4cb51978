// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Shell command execution tool
//!
//! Runs a command under `sh -c` with stdin wired to /dev/null and stdout and
//! stderr captured separately. The result is a JSON object so the model gets
//! structured access to both streams and the exit code.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// Default timeout for shell executions.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tool for executing shell commands
pub struct ExecShellTool {
    default_timeout: u64,
}

impl ExecShellTool {
    /// Create a new shell tool with the default timeout.
    pub fn new() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for ExecShellTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExecShellTool {
    fn name(&self) -> &str {
        "exec_shell"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "exec_shell".to_string(),
            description:
                "Execute a shell command and return its stdout, stderr and exit code as JSON. \
                 Commands run in the working directory with a timeout."
                    .to_string(),
            input_schema: SchemaBuilder::new()
                .string("command", "The shell command to execute", true)
                .string("cwd", "Working directory override", false)
                .integer("timeout", "Timeout in seconds (default: 30)", false)
                .build(),
        }
    }

    async fn execute(
        &self,
        tool_call_id: String,
        input: Value,
        context: &ToolContext,
    ) -> Result<ToolResult> {
        let command = input["command"]
            .as_str()
            .ok_or_else(|| CaretError::InvalidInput("command is required".to_string()))?;
        let timeout_secs = input["timeout"].as_u64().unwrap_or(self.default_timeout);
        let cwd = input["cwd"]
            .as_str()
            .map(|c| context.resolve(c))
            .unwrap_or_else(|| context.working_directory.clone());

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Failed to spawn command: {}", e),
                ));
            }
        };

        let output = match timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Command failed: {}", e),
                ));
            }
            Err(_) => {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Command timed out after {} seconds", timeout_secs),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        let result = serde_json::json!({
            "stdout": stdout,
            "stderr": stderr,
            "exitCode": exit_code,
        });

        Ok(ToolResult::success(tool_call_id, result.to_string()))
    }
}
