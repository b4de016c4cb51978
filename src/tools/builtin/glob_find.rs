// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! File finding tool
//!
//! Enumerates the tree and tests each relative path against a regex derived
//! from the glob. Results are sorted newest-first and capped.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{CaretError, Result};
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolResult};

/// Maximum entries returned to the model.
const MAX_RESULTS: usize = 200;

/// Tool for finding files by glob pattern
pub struct GlobFindTool;

/// Translate a glob pattern (`**`, `*`, `?`) into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    let mut regex = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        // `**/` also matches zero directories.
                        regex.push_str("(?:.*/)?");
                    } else {
                        regex.push_str(".*");
                    }
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                regex.push('\\');
                regex.push(ch);
            }
            other => regex.push(other),
        }
    }

    regex.push('$');
    Regex::new(&regex)
}

fn mtime(path: &Path) -> SystemTime {
    path.metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[async_trait]
impl Tool for GlobFindTool {
    fn name(&self) -> &str {
        "glob_find"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "glob_find".to_string(),
            description:
                "Find files matching a glob pattern like src/**/*.rs. Results are sorted by \
                 modification time, newest first."
                    .to_string(),
            input_schema: SchemaBuilder::new()
                .string("pattern", "The glob pattern to match against relative paths", true)
                .string("path", "Root directory to search (default: working directory)", false)
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
        let root = input["path"]
            .as_str()
            .map(|p| context.resolve(p))
            .unwrap_or_else(|| context.working_directory.clone());

        let regex = match glob_to_regex(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                return Ok(ToolResult::error(
                    tool_call_id,
                    format!("Invalid glob pattern: {}", e),
                ));
            }
        };

        let mut matches: Vec<(std::path::PathBuf, SystemTime)> = Vec::new();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let relative_str = relative.to_string_lossy().replace('\\', "/");
            if regex.is_match(&relative_str) {
                matches.push((relative.to_path_buf(), mtime(entry.path())));
            }
        }

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(MAX_RESULTS);

        if matches.is_empty() {
            return Ok(ToolResult::success(tool_call_id, "No files matched"));
        }

        let listing: Vec<String> = matches
            .iter()
            .map(|(path, _)| path.to_string_lossy().to_string())
            .collect();

        Ok(ToolResult::success(tool_call_id, listing.join("\n")))
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
        assert_eq!(GlobFindTool.name(), "glob_find");
    }

    #[test]
    fn test_glob_to_regex_star() {
        let re = glob_to_regex("*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(!re.is_match("src/main.rs"));
        assert!(!re.is_match("main.rst"));
    }

    #[test]
    fn test_glob_to_regex_double_star() {
        let re = glob_to_regex("**/*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(re.is_match("src/main.rs"));
        assert!(re.is_match("src/deep/nested/mod.rs"));
        assert!(!re.is_match("src/main.md"));
    }

    #[test]
    fn test_glob_to_regex_question_mark() {
        let re = glob_to_regex("file?.txt").unwrap();
        assert!(re.is_match("file1.txt"));
        assert!(!re.is_match("file12.txt"));
        assert!(!re.is_match("file/.txt"));
    }

    #[test]
    fn test_glob_to_regex_escapes_special_chars() {
        let re = glob_to_regex("a+b.txt").unwrap();
        assert!(re.is_match("a+b.txt"));
        assert!(!re.is_match("aab.txt"));
    }

    #[test]
    fn test_glob_to_regex_prefix_double_star() {
        let re = glob_to_regex("src/**").unwrap();
        assert!(re.is_match("src/main.rs"));
        assert!(re.is_match("src/a/b/c.txt"));
        assert!(!re.is_match("other/main.rs"));
    }

    #[tokio::test]
    async fn test_finds_matching_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "x").unwrap();
        std::fs::write(dir.path().join("src/sub/lib.rs"), "x").unwrap();
        std::fs::write(dir.path().join("README.md"), "x").unwrap();

        let result = GlobFindTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "**/*.rs"}),
                &context(&dir),
            )
            .await
            .unwrap();

        let text = result.output_text();
        assert!(text.contains("src/main.rs"));
        assert!(text.contains("src/sub/lib.rs"));
        assert!(!text.contains("README.md"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();

        let result = GlobFindTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "*.py"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert_eq!(result.output_text(), "No files matched");
    }

    #[tokio::test]
    async fn test_directories_excluded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("match.rs")).unwrap();
        std::fs::write(dir.path().join("file.rs"), "x").unwrap();

        let result = GlobFindTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "*.rs"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert_eq!(result.output_text(), "file.rs");
    }

    #[tokio::test]
    async fn test_result_cap() {
        let dir = TempDir::new().unwrap();
        for i in 0..250 {
            std::fs::write(dir.path().join(format!("f{:03}.txt", i)), "x").unwrap();
        }

        let result = GlobFindTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "*.txt"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert_eq!(result.output_text().lines().count(), MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_search_subdirectory_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "x").unwrap();
        std::fs::write(dir.path().join("outer.txt"), "x").unwrap();

        let result = GlobFindTool
            .execute(
                "t1".to_string(),
                serde_json::json!({"pattern": "*.txt", "path": "sub"}),
                &context(&dir),
            )
            .await
            .unwrap();

        assert_eq!(result.output_text(), "inner.txt");
    }
}
