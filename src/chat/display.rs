// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Terminal output helpers
//!
//! Tool-call and permission lines go to stderr so they never corrupt the
//! token stream on stdout.

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use std::io::{self, Write};

use crate::error::CaretError;
use crate::tools::{ToolOutput, ToolResult};

/// Print the session banner.
pub fn print_banner(provider: &str, model: &str) {
    let mut stdout = io::stdout();
    let _ = stdout.execute(SetForegroundColor(Color::Cyan));
    println!("CaretForge · {} / {}", provider, model);
    let _ = stdout.execute(ResetColor);
    println!("Type /help for commands, /exit to leave.");
}

/// Print the pre-session disclaimer.
pub fn print_disclaimer() {
    let mut stdout = io::stdout();
    let _ = stdout.execute(SetForegroundColor(Color::DarkGrey));
    println!(
        "CaretForge executes model-chosen commands on this machine after your \
         approval. Review each request before allowing it."
    );
    let _ = stdout.execute(ResetColor);
}

/// One-line summary of the built file index.
pub fn print_index_summary(file_count: usize, timed_out: bool) {
    if timed_out {
        println!("Indexed {} files (stopped at the deadline).", file_count);
    } else {
        println!("Indexed {} files for @ references.", file_count);
    }
}

/// A tool invocation line.
pub fn print_tool_call(name: &str, args: &serde_json::Value) {
    let mut stderr = io::stderr();
    let _ = stderr.execute(SetForegroundColor(Color::Blue));
    let _ = write!(stderr, "→ {}", name);
    let _ = stderr.execute(ResetColor);
    let compact = summarize_args(args);
    if compact.is_empty() {
        let _ = writeln!(stderr);
    } else {
        let _ = writeln!(stderr, " {}", compact);
    }
}

/// A tool result line.
pub fn print_tool_result(result: &ToolResult) {
    let mut stderr = io::stderr();
    match &result.output {
        ToolOutput::Success(text) => {
            let _ = stderr.execute(SetForegroundColor(Color::Green));
            let _ = write!(stderr, "✓ ");
            let _ = stderr.execute(ResetColor);
            let _ = writeln!(stderr, "{}", first_line(text));
        }
        ToolOutput::Error(text) => {
            let _ = stderr.execute(SetForegroundColor(Color::Red));
            let _ = write!(stderr, "✗ ");
            let _ = stderr.execute(ResetColor);
            let _ = writeln!(stderr, "{}", first_line(text));
        }
    }
}

/// An error with its short code, cause on a second line when present.
pub fn print_error(error: &CaretError) {
    let mut stderr = io::stderr();
    let _ = stderr.execute(SetForegroundColor(Color::Red));
    let _ = writeln!(stderr, "error[{}]: {}", error.code(), error);
    let _ = stderr.execute(ResetColor);
    if let Some(source) = std::error::Error::source(error) {
        let _ = writeln!(stderr, "  caused by: {}", source);
    }
}

/// Compact single-line rendering of tool arguments.
pub fn summarize_args(args: &serde_json::Value) -> String {
    let Some(object) = args.as_object() else {
        return String::new();
    };
    let parts: Vec<String> = object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => truncate(s, 60),
                other => truncate(&other.to_string(), 60),
            };
            format!("{}={}", key, rendered)
        })
        .collect();
    parts.join(" ")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}…", head)
    }
}
