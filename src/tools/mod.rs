// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Tool system for CaretForge
//!
//! Provides the framework for tools the model can use to interact with the
//! filesystem and shell. The definition set is fixed at registry
//! construction; permission gating happens in the agent loop after the model
//! chooses a tool, never by withholding definitions.

pub mod builtin;
pub mod definition;
pub mod permission;

pub use definition::SchemaBuilder;
pub use permission::PermissionManager;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Current working directory
    pub working_directory: PathBuf,
    /// Current session ID
    pub session_id: uuid::Uuid,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(working_directory: PathBuf) -> Self {
        Self {
            working_directory,
            session_id: uuid::Uuid::new_v4(),
        }
    }

    /// Resolve a possibly-relative path against the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = PathBuf::from(path);
        if candidate.is_absolute() {
            candidate
        } else {
            self.working_directory.join(candidate)
        }
    }
}

/// Result of tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The tool_call_id this result corresponds to
    pub tool_call_id: String,
    /// The output of the tool
    pub output: ToolOutput,
}

/// Output from a tool
#[derive(Debug, Clone)]
pub enum ToolOutput {
    /// Successful output
    Success(String),
    /// Error output
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutput::Success(output.into()),
        }
    }

    /// Create an error result
    pub fn error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutput::Error(error.into()),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// Get the output text
    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutput::Success(s) => s,
            ToolOutput::Error(s) => s,
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool definition for the model
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given input
    async fn execute(
        &self,
        tool_call_id: String,
        input: Value,
        context: &ToolContext,
    ) -> Result<ToolResult>;
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Definition order, kept stable for the model
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a registry with all built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::ReadFileTool));
        registry.register(Arc::new(builtin::WriteFileTool));
        registry.register(Arc::new(builtin::EditFileTool));
        registry.register(Arc::new(builtin::ExecShellTool::new()));
        registry.register(Arc::new(builtin::GrepSearchTool));
        registry.register(Arc::new(builtin::GlobFindTool));
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Get all tool definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition())
            .collect()
    }

    /// List all tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_context_resolve() {
        let context = ToolContext::new(PathBuf::from("/work"));

        assert_eq!(context.resolve("src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(context.resolve("/abs/file"), PathBuf::from("/abs/file"));
    }

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("call_1", "done");
        assert!(!result.is_error());
        assert_eq!(result.output_text(), "done");
        assert_eq!(result.tool_call_id, "call_1");
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("call_1", "boom");
        assert!(result.is_error());
        assert_eq!(result.output_text(), "boom");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 6);
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("write_file").is_some());
        assert!(registry.get("edit_file").is_some());
        assert!(registry.get("exec_shell").is_some());
        assert!(registry.get("grep_search").is_some());
        assert!(registry.get("glob_find").is_some());
    }

    #[test]
    fn test_registry_unknown_tool() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.get("spawn_subagent").is_none());
    }

    #[test]
    fn test_registry_definitions_stable_order() {
        let registry = ToolRegistry::with_builtins();
        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "read_file",
                "write_file",
                "edit_file",
                "exec_shell",
                "grep_search",
                "glob_find"
            ]
        );
    }

    #[test]
    fn test_registry_empty() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }
}
