// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Safety classifier properties

use caretforge::safety::{analyse_command, analyse_write_path, SafetyLevel};

#[test]
fn blocked_patterns_survive_whitespace() {
    for command in [
        "rm -rf /",
        "  rm -rf /  ",
        "\trm  -rf\t/",
        "sudo rm -rf /",
        "echo done && rm -rf /",
    ] {
        assert_eq!(
            analyse_command(command).level,
            SafetyLevel::Blocked,
            "expected blocked: {:?}",
            command
        );
    }
}

#[test]
fn chained_commands_inherit_worst_tier() {
    let cases = [
        ("ls | grep x", SafetyLevel::Safe),
        ("ls && touch y", SafetyLevel::Mutating),
        ("cat f; rm f", SafetyLevel::Destructive),
        ("git status | cat && rm -rf /", SafetyLevel::Blocked),
    ];
    for (command, expected) in cases {
        assert_eq!(
            analyse_command(command).level,
            expected,
            "command {:?}",
            command
        );
    }
}

#[test]
fn whitelist_is_safe_and_default_is_mutating() {
    assert_eq!(analyse_command("ls -la").level, SafetyLevel::Safe);
    assert_eq!(analyse_command("git diff HEAD~1").level, SafetyLevel::Safe);
    assert_eq!(analyse_command("node -v").level, SafetyLevel::Safe);

    assert_eq!(analyse_command("cargo build").level, SafetyLevel::Mutating);
    assert_eq!(analyse_command("pip install x").level, SafetyLevel::Mutating);
}

#[test]
fn destructive_table() {
    for command in [
        "rm old.txt",
        "dd if=a of=b",
        "kill -9 123",
        "killall node",
        "sudo ls",
        "shutdown now",
        "systemctl stop cron",
        "iptables -L -v",
        "echo x > /var/tmp/y",
    ] {
        assert_eq!(
            analyse_command(command).level,
            SafetyLevel::Destructive,
            "expected destructive: {:?}",
            command
        );
    }
}

#[test]
fn write_paths_under_etc_blocked() {
    for path in ["/etc/passwd", "/etc/hosts", "/etc/ssh/config", "/etc"] {
        assert_eq!(
            analyse_write_path(path).level,
            SafetyLevel::Blocked,
            "path {:?}",
            path
        );
    }
}

#[test]
fn home_bashrc_destructive() {
    assert_eq!(analyse_write_path("~/.bashrc").level, SafetyLevel::Destructive);
    if let Some(home) = dirs::home_dir() {
        let abs = format!("{}/.bashrc", home.display());
        assert_eq!(analyse_write_path(&abs).level, SafetyLevel::Destructive);
    }
}

#[test]
fn workspace_paths_mutating() {
    assert_eq!(analyse_write_path("src/x").level, SafetyLevel::Mutating);
    assert_eq!(analyse_write_path("docs/readme.md").level, SafetyLevel::Mutating);
}

#[test]
fn env_files_blocked_anywhere() {
    assert_eq!(analyse_write_path(".env").level, SafetyLevel::Blocked);
    assert_eq!(analyse_write_path("app/.env.local").level, SafetyLevel::Blocked);
}

#[test]
fn verdicts_carry_reasons() {
    assert!(!analyse_command("rm -rf /").reason.is_empty());
    assert!(!analyse_command("ls").reason.is_empty());
    assert!(!analyse_write_path("/etc/x").reason.is_empty());
}
