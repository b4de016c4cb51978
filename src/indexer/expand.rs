// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! `@path` reference expansion
//!
//! Every `@path` token in a prompt is resolved against the index (or a
//! direct stat), read under caps, and prepended to the prompt as a file
//! block. Expanded tokens are rewritten to the bare path so the model sees a
//! normal sentence.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::{is_text_path, FileIndex, MAX_FILE_SIZE};

/// Content cap per expanded file.
pub const MAX_CONTENT_BYTES: usize = 256 * 1024;
/// Per-line character cap.
pub const MAX_LINE_CHARS: usize = 2000;
/// Total line cap.
pub const MAX_LINES: usize = 2000;

static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([^\s@]+)").expect("reference pattern must compile"));

/// A resolved `@path` expansion
#[derive(Debug, Clone)]
pub struct FileReference {
    /// Path as written in the prompt
    pub path: String,
    /// File content, possibly truncated
    pub content: String,
    /// Original byte size
    pub size: u64,
    /// Whether any cap was applied
    pub truncated: bool,
}

/// The result of expanding a prompt
#[derive(Debug, Clone)]
pub struct ExpandedPrompt {
    /// The enriched prompt handed to the model
    pub prompt: String,
    /// Every successfully expanded reference
    pub references: Vec<FileReference>,
}

/// Expand every `@path` token in a prompt.
///
/// Unresolvable or non-text tokens are left untouched in the prompt.
pub fn expand_references(prompt: &str, index: &FileIndex) -> ExpandedPrompt {
    let mut references: Vec<FileReference> = Vec::new();

    for capture in REFERENCE_PATTERN.captures_iter(prompt) {
        let path_str = &capture[1];
        if references.iter().any(|r| r.path == path_str) {
            continue;
        }
        if let Some(reference) = resolve_reference(path_str, index) {
            references.push(reference);
        }
    }

    if references.is_empty() {
        return ExpandedPrompt {
            prompt: prompt.to_string(),
            references,
        };
    }

    let mut stripped = prompt.to_string();
    let mut preamble = String::new();
    for reference in &references {
        preamble.push_str(&format!("[File: {}]\n{}\n\n", reference.path, reference.content));
        stripped = stripped.replace(&format!("@{}", reference.path), &reference.path);
    }

    ExpandedPrompt {
        prompt: format!("{}{}", preamble, stripped),
        references,
    }
}

/// Resolve one token against the index or the filesystem.
fn resolve_reference(path_str: &str, index: &FileIndex) -> Option<FileReference> {
    let absolute = index.root().join(path_str);

    let size = match index.get(path_str) {
        Some(indexed) => indexed.size,
        None => {
            let metadata = absolute.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            metadata.len()
        }
    };

    if !is_text_path(Path::new(path_str)) || size > MAX_FILE_SIZE {
        return None;
    }

    let raw = std::fs::read_to_string(&absolute).ok()?;
    let (content, truncated) = truncate_content(&raw);

    Some(FileReference {
        path: path_str.to_string(),
        content,
        size,
        truncated,
    })
}

/// Apply the byte, line-length and line-count caps.
fn truncate_content(raw: &str) -> (String, bool) {
    let mut truncated = false;

    let byte_capped: &str = if raw.len() > MAX_CONTENT_BYTES {
        truncated = true;
        let mut end = MAX_CONTENT_BYTES;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        &raw[..end]
    } else {
        raw
    };

    let mut lines: Vec<String> = Vec::new();
    for line in byte_capped.lines() {
        if lines.len() >= MAX_LINES {
            truncated = true;
            break;
        }
        if line.chars().count() > MAX_LINE_CHARS {
            truncated = true;
            let capped: String = line.chars().take(MAX_LINE_CHARS).collect();
            lines.push(format!("{}…", capped));
        } else {
            lines.push(line.to_string());
        }
    }

    (lines.join("\n"), truncated)
}
