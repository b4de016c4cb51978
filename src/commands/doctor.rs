// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! The `doctor` subcommand: check the local setup
//!
//! Runs a fixed list of checks and reports pass/fail; any failure turns
//! into exit code 1.

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use std::io::{self, Write};
use std::path::Path;

use crate::config::Config;

/// One check outcome
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run every check against a loaded (or failed-to-load) config.
pub fn run_checks(
    config: &crate::error::Result<Config>,
    working_dir: &Path,
) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match config {
        Ok(config) => {
            results.push(CheckResult {
                name: "config",
                passed: true,
                detail: format!("{} provider(s) configured", config.providers.len()),
            });
            match config.resolve_provider(None) {
                Ok(resolved) => results.push(CheckResult {
                    name: "provider",
                    passed: true,
                    detail: format!(
                        "default '{}' resolves to {}",
                        resolved.name,
                        resolved.provider.name()
                    ),
                }),
                Err(e) => results.push(CheckResult {
                    name: "provider",
                    passed: false,
                    detail: e.to_string(),
                }),
            }
        }
        Err(e) => {
            results.push(CheckResult {
                name: "config",
                passed: false,
                detail: e.to_string(),
            });
        }
    }

    let writable = tempfile_probe(working_dir);
    results.push(CheckResult {
        name: "working-directory",
        passed: writable,
        detail: if writable {
            format!("{} is writable", working_dir.display())
        } else {
            format!("{} is not writable", working_dir.display())
        },
    });

    let has_ripgrep = which("rg");
    results.push(CheckResult {
        name: "ripgrep",
        passed: true, // grep fallback exists, so this is informational
        detail: if has_ripgrep {
            "rg found".to_string()
        } else {
            "rg not found, grep_search will fall back to grep".to_string()
        },
    });

    let has_git = which("git");
    results.push(CheckResult {
        name: "git",
        passed: true, // walk fallback exists
        detail: if has_git {
            "git found".to_string()
        } else {
            "git not found, file indexing will walk the tree".to_string()
        },
    });

    results
}

/// Print results; true when everything passed.
pub fn report(results: &[CheckResult]) -> bool {
    let mut stdout = io::stdout();
    let mut all_passed = true;

    for result in results {
        if result.passed {
            let _ = stdout.execute(SetForegroundColor(Color::Green));
            let _ = write!(stdout, "✓ ");
        } else {
            all_passed = false;
            let _ = stdout.execute(SetForegroundColor(Color::Red));
            let _ = write!(stdout, "✗ ");
        }
        let _ = stdout.execute(ResetColor);
        println!("{}: {}", result.name, result.detail);
    }

    all_passed
}

fn tempfile_probe(dir: &Path) -> bool {
    let probe = dir.join(".caretforge-doctor-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn which(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
