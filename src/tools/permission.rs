// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Permission gating for dangerous tools
//!
//! Composes the static safety classification with a session-scoped approval
//! state machine. The session "always" flags start from CLI flags, are set
//! monotonically when the user answers `always`, and never persist to disk.

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use serde_json::Value;
use std::io::{self, BufRead, IsTerminal, Write};

use crate::safety::{analyse_command, analyse_write_path, SafetyLevel, Verdict};

/// Outcome of parsing one prompt answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    /// Allow this call only
    AllowOnce,
    /// Allow and set the session "always" flag
    AllowAlways,
    /// Deny this call
    Deny,
}

/// Parse the user's prompt reply. Empty input allows once; `always` is only
/// honored when offered.
pub fn parse_prompt_answer(input: &str, offer_always: bool) -> PromptAnswer {
    match input.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => PromptAnswer::AllowOnce,
        "a" | "always" if offer_always => PromptAnswer::AllowAlways,
        _ => PromptAnswer::Deny,
    }
}

/// Session permission state plus the interactive approval machinery
pub struct PermissionManager {
    /// Session-wide approval for write_file/edit_file
    always_write: bool,
    /// Session-wide approval for exec_shell
    always_shell: bool,
    /// Whether prompting is possible at all
    interactive: bool,
}

impl PermissionManager {
    /// Create a manager from the CLI flags, detecting interactivity from
    /// stdin.
    pub fn new(allow_write: bool, allow_shell: bool) -> Self {
        Self {
            always_write: allow_write,
            always_shell: allow_shell,
            interactive: io::stdin().is_terminal(),
        }
    }

    /// Override interactivity (used by tests and `--json` mode).
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Whether write_file/edit_file are session-approved.
    pub fn always_write(&self) -> bool {
        self.always_write
    }

    /// Whether exec_shell is session-approved.
    pub fn always_shell(&self) -> bool {
        self.always_shell
    }

    /// Decide whether a tool call may run.
    ///
    /// Decision table: read_file is always allowed; the gated tools compose
    /// the safety tier of their arguments with the session flags and
    /// interactivity; anything else is denied.
    pub fn check(&mut self, tool_name: &str, args: &Value) -> bool {
        match tool_name {
            "read_file" => true,
            "exec_shell" => {
                let command = args["command"].as_str().unwrap_or_default();
                let verdict = analyse_command(command);
                self.decide(tool_name, &verdict, command, GatedKind::Shell)
            }
            "write_file" | "edit_file" => {
                let path = args["path"].as_str().unwrap_or_default();
                let verdict = analyse_write_path(path);
                self.decide(tool_name, &verdict, path, GatedKind::Write)
            }
            _ => false,
        }
    }

    fn decide(&mut self, tool_name: &str, verdict: &Verdict, target: &str, kind: GatedKind) -> bool {
        match verdict.level {
            SafetyLevel::Blocked => {
                self.print_blocked(tool_name, target, &verdict.reason);
                false
            }
            SafetyLevel::Safe | SafetyLevel::Mutating => {
                if self.always_flag(kind) {
                    return true;
                }
                if !self.interactive {
                    return false;
                }
                match self.prompt(tool_name, verdict, target, true) {
                    PromptAnswer::AllowOnce => true,
                    PromptAnswer::AllowAlways => {
                        self.set_always_flag(kind);
                        true
                    }
                    PromptAnswer::Deny => false,
                }
            }
            SafetyLevel::Destructive => {
                // Session "always" never covers destructive calls.
                if !self.interactive {
                    return false;
                }
                matches!(
                    self.prompt(tool_name, verdict, target, false),
                    PromptAnswer::AllowOnce
                )
            }
        }
    }

    fn always_flag(&self, kind: GatedKind) -> bool {
        match kind {
            GatedKind::Shell => self.always_shell,
            GatedKind::Write => self.always_write,
        }
    }

    fn set_always_flag(&mut self, kind: GatedKind) {
        match kind {
            GatedKind::Shell => self.always_shell = true,
            GatedKind::Write => self.always_write = true,
        }
    }

    fn print_blocked(&self, tool_name: &str, target: &str, reason: &str) {
        let mut stderr = io::stderr();
        let _ = stderr.execute(SetForegroundColor(Color::Red));
        let _ = writeln!(stderr, "✗ {} blocked: {} ({})", tool_name, target, reason);
        let _ = stderr.execute(ResetColor);
    }

    fn prompt(
        &self,
        tool_name: &str,
        verdict: &Verdict,
        target: &str,
        offer_always: bool,
    ) -> PromptAnswer {
        let mut stderr = io::stderr();
        let color = if verdict.level == SafetyLevel::Destructive {
            Color::Red
        } else {
            Color::Yellow
        };

        let _ = writeln!(stderr);
        let _ = stderr.execute(SetForegroundColor(color));
        let _ = write!(stderr, "⚠ ");
        let _ = stderr.execute(ResetColor);
        let _ = writeln!(stderr, "{} wants to run:", tool_name);
        let _ = writeln!(stderr, "  {}", target);
        let _ = writeln!(stderr, "  ({})", verdict.reason);

        if offer_always {
            let _ = write!(stderr, "Allow? [y]es / [n]o / [a]lways: ");
        } else {
            let _ = write!(stderr, "Allow? [y]es / [n]o: ");
        }
        let _ = stderr.flush();

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input).is_err() {
            return PromptAnswer::Deny;
        }
        parse_prompt_answer(&input, offer_always)
    }
}

#[derive(Debug, Clone, Copy)]
enum GatedKind {
    Shell,
    Write,
}
