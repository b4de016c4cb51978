// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Static safety classification for shell commands and write paths
//!
//! Two pure functions assign one of four risk tiers to a literal string.
//! Neither touches the filesystem; classification is regex-table driven so
//! the permission layer can stay a plain lookup table. Piped and chained
//! commands inherit their worst-tier segment.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Risk tier for a command or write target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    /// Read-only, always allowed
    Safe,
    /// Changes state inside the workspace
    Mutating,
    /// Changes state that is hard to undo
    Destructive,
    /// Never executed
    Blocked,
}

/// Classification result: a tier plus a human reason
#[derive(Debug, Clone)]
pub struct Verdict {
    pub level: SafetyLevel,
    pub reason: String,
}

impl Verdict {
    fn new(level: SafetyLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
        }
    }
}

static BLOCKED_COMMANDS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"\brm\s+(-[a-zA-Z]+\s+)*-[a-zA-Z]*r[a-zA-Z]*\s+/(\s|$|\*)",
            "recursive delete targeting the filesystem root",
        ),
        (
            r"\brm\s+(-[a-zA-Z]+\s+)*-[a-zA-Z]*r[a-zA-Z]*\s+(~|\$HOME)/?(\s|$)",
            "recursive delete targeting the home directory",
        ),
        (
            r"\brm\s+(-[a-zA-Z]+\s+)*-[a-zA-Z]*r[a-zA-Z]*\s+\.(\s|$)",
            "recursive delete of the current directory",
        ),
        (
            r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
            "fork bomb",
        ),
        (
            r">\s*/dev/(sd|hd|nvme|vd|disk)",
            "redirect onto a block device",
        ),
        (r"\bmkfs(\.\w+)?\b", "filesystem creation"),
        (r"\bdd\b[^|;&]*\bof=/dev/", "raw write to a device"),
        (r">\s*/etc/", "truncating a file under /etc"),
        (
            r"\b(curl|wget)\b[^|;&]*\|\s*(sudo\s+)?(ba|z|da|k)?sh\b",
            "piping a download into a shell",
        ),
    ]
    .into_iter()
    .map(|(pattern, reason)| (Regex::new(pattern).expect("blocked pattern must compile"), reason))
    .collect()
});

static DESTRUCTIVE_COMMANDS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\brm\b", "deletes files"),
        (r"\bdd\b", "raw disk copy"),
        (
            r"\bchmod\s+(-[a-zA-Z]*R|--recursive)\b",
            "recursive permission change",
        ),
        (
            r"\bchown\s+(-[a-zA-Z]*R|--recursive)\b",
            "recursive ownership change",
        ),
        (r"\bkill\s+-9\b", "force-kills a process"),
        (r"\bkillall\b", "kills processes by name"),
        (r"\bpkill\b", "kills processes by pattern"),
        (r"\bsudo\b", "escalates privileges"),
        (r"(^|\s)su(\s|$)", "switches user"),
        (r"\bshutdown\b", "shuts the machine down"),
        (r"\breboot\b", "reboots the machine"),
        (
            r"\bsystemctl\s+(stop|restart|disable)\b",
            "alters a system service",
        ),
        (r"\biptables\b", "changes firewall rules"),
        (r">{1,2}\s*/\S+", "redirects onto an absolute path"),
    ]
    .into_iter()
    .map(|(pattern, reason)| {
        (
            Regex::new(pattern).expect("destructive pattern must compile"),
            reason,
        )
    })
    .collect()
});

/// Single-word commands whose plain invocation is read-only.
const READ_ONLY_COMMANDS: &[&str] = &[
    "ls", "cat", "head", "tail", "less", "more", "grep", "egrep", "fgrep", "rg", "find", "fd",
    "pwd", "printf", "which", "whereis", "file", "stat", "wc", "du", "df", "ps", "top", "free",
    "env", "printenv", "date", "whoami", "uname", "hostname", "id", "uptime", "tree", "basename",
    "dirname", "realpath", "readlink", "diff", "cmp", "sort", "uniq", "cut", "type",
];

/// Two-word invocations that are read-only (subcommand or version probes).
const READ_ONLY_PAIRS: &[&str] = &[
    "git status",
    "git log",
    "git diff",
    "git show",
    "git branch",
    "git blame",
    "git shortlog",
    "git describe",
    "git rev-parse",
    "git ls-files",
    "git remote",
    "node -v",
    "node --version",
    "npm -v",
    "npm --version",
    "python --version",
    "python3 --version",
    "rustc --version",
    "cargo --version",
    "go version",
    "java -version",
];

/// Classify a shell command string into a risk tier.
///
/// Order: blocked table, destructive table, pipe/chain split with worst-tier
/// propagation, read-only whitelist, default mutating.
pub fn analyse_command(command: &str) -> Verdict {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Verdict::new(SafetyLevel::Safe, "empty command");
    }

    for (pattern, reason) in BLOCKED_COMMANDS.iter() {
        if pattern.is_match(trimmed) {
            return Verdict::new(SafetyLevel::Blocked, *reason);
        }
    }

    for (pattern, reason) in DESTRUCTIVE_COMMANDS.iter() {
        if pattern.is_match(trimmed) {
            return Verdict::new(SafetyLevel::Destructive, *reason);
        }
    }

    if let Some(segments) = split_segments(trimmed) {
        let mut worst = Verdict::new(SafetyLevel::Safe, "all segments read-only");
        for segment in segments {
            let verdict = analyse_command(&segment);
            if verdict.level > worst.level {
                worst = verdict;
            }
        }
        return worst;
    }

    if is_read_only(trimmed) {
        return Verdict::new(SafetyLevel::Safe, "read-only command");
    }

    Verdict::new(SafetyLevel::Mutating, "may modify state")
}

/// Split on `|`, `&&` and `;`; None when the command has no chain.
fn split_segments(command: &str) -> Option<Vec<String>> {
    if !command.contains('|') && !command.contains("&&") && !command.contains(';') {
        return None;
    }
    let segments: Vec<String> = command
        .replace("&&", ";")
        .split(['|', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() <= 1 {
        return None;
    }
    Some(segments)
}

fn is_read_only(segment: &str) -> bool {
    // Redirection makes any command a write.
    if segment.contains('>') {
        return false;
    }
    let mut tokens = segment.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    if let Some(second) = tokens.next() {
        let pair = format!("{} {}", first, second);
        if READ_ONLY_PAIRS.contains(&pair.as_str()) {
            return true;
        }
    }
    READ_ONLY_COMMANDS.contains(&first)
}

/// Path prefixes that must never be written.
const BLOCKED_PATH_PREFIXES: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/boot", "/dev", "/proc", "/sys",
];

/// Home-relative locations that must never be written.
const BLOCKED_HOME_PATHS: &[&str] = &[
    "~/.ssh",
    "~/.gnupg",
    "~/.aws/credentials",
    "~/.azure",
    "~/.kube/config",
];

/// Basenames that must never be written.
const BLOCKED_BASENAMES: &[&str] = &[".env", ".env.local"];

/// Home-relative dotfiles whose overwrite is destructive.
const DESTRUCTIVE_HOME_PATHS: &[&str] = &[
    "~/.bashrc",
    "~/.zshrc",
    "~/.profile",
    "~/.bash_profile",
    "~/.gitconfig",
    "~/.npmrc",
];

/// Classify a write target into a risk tier.
///
/// Both the raw path and a home-expanded form are checked.
pub fn analyse_write_path(path: &str) -> Verdict {
    let trimmed = path.trim();
    let expanded = expand_home(trimmed);
    let contracted = contract_home(&expanded);

    for prefix in BLOCKED_PATH_PREFIXES {
        if path_starts_with(&expanded, prefix) || path_starts_with(trimmed, prefix) {
            return Verdict::new(
                SafetyLevel::Blocked,
                format!("writes under protected path {}", prefix),
            );
        }
    }

    for entry in BLOCKED_HOME_PATHS {
        if path_starts_with(&contracted, entry) {
            return Verdict::new(
                SafetyLevel::Blocked,
                format!("writes under protected path {}", entry),
            );
        }
    }

    let basename = PathBuf::from(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if BLOCKED_BASENAMES.contains(&basename.as_str()) {
        return Verdict::new(
            SafetyLevel::Blocked,
            format!("{} holds secrets", basename),
        );
    }

    for entry in DESTRUCTIVE_HOME_PATHS {
        if contracted == *entry {
            return Verdict::new(
                SafetyLevel::Destructive,
                format!("overwrites shell configuration {}", entry),
            );
        }
    }

    Verdict::new(SafetyLevel::Mutating, "writes a file")
}

/// True when `path` is `prefix` or lives underneath it.
fn path_starts_with(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

/// Replace a leading `~` with the home directory.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{}", home.display(), &path[1..]);
        }
    }
    path.to_string()
}

/// Replace a leading home directory with `~`.
fn contract_home(path: &str) -> String {
    if let Some(home) = dirs::home_dir() {
        let home = home.display().to_string();
        if path == home {
            return "~".to_string();
        }
        if let Some(rest) = path.strip_prefix(&format!("{}/", home)) {
            return format!("~/{}", rest);
        }
    }
    path.to_string()
}
