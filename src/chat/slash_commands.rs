// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! REPL slash commands
//!
//! Parses a REPL input line into either a command or a prompt for the
//! model. Bare `exit`/`quit`/`q` also leave the session.

/// A parsed slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/help`
    Help,
    /// `/clear`
    Clear,
    /// `/compact`
    Compact,
    /// `/model` with no argument
    ModelList,
    /// `/model <id>`, possibly `provider/model`
    ModelSwitch(String),
    /// `/exit`, `/quit`, and the bare exit words
    Exit,
    /// Unrecognized slash command
    Unknown(String),
}

/// What to do with one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Run a command
    Command(SlashCommand),
    /// Send to the model
    Prompt(String),
    /// Nothing to do
    Empty,
}

/// `/compact` keeps this many trailing messages.
pub const COMPACT_KEEP: usize = 4;

/// Parse one REPL line.
pub fn parse_input(line: &str) -> InputAction {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return InputAction::Empty;
    }

    match trimmed {
        "exit" | "quit" | "q" => return InputAction::Command(SlashCommand::Exit),
        _ => {}
    }

    let Some(rest) = trimmed.strip_prefix('/') else {
        return InputAction::Prompt(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let parsed = match (command, argument) {
        ("help", _) => SlashCommand::Help,
        ("clear", _) => SlashCommand::Clear,
        ("compact", _) => SlashCommand::Compact,
        ("model", None) => SlashCommand::ModelList,
        ("model", Some(id)) => SlashCommand::ModelSwitch(id.to_string()),
        ("exit", _) | ("quit", _) => SlashCommand::Exit,
        (other, _) => SlashCommand::Unknown(other.to_string()),
    };

    InputAction::Command(parsed)
}

/// Split a `/model` argument into optional provider and model.
pub fn split_model_switch(argument: &str) -> (Option<&str>, &str) {
    match argument.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            (Some(provider), model)
        }
        _ => (None, argument),
    }
}

/// The `/help` text.
pub fn help_text() -> &'static str {
    "Commands:\n\
     /help           Show this help\n\
     /clear          Clear the conversation\n\
     /compact        Keep only the last few messages\n\
     /model          List available models\n\
     /model <id>     Switch model (provider/model switches provider too)\n\
     /exit, /quit    Leave the session\n\
     \n\
     Reference files with @path; Tab completes after @."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_input(""), InputAction::Empty);
        assert_eq!(parse_input("   "), InputAction::Empty);
    }

    #[test]
    fn test_parse_prompt() {
        assert_eq!(
            parse_input("explain this code"),
            InputAction::Prompt("explain this code".to_string())
        );
    }

    #[test]
    fn test_parse_bare_exit_words() {
        assert_eq!(parse_input("exit"), InputAction::Command(SlashCommand::Exit));
        assert_eq!(parse_input("quit"), InputAction::Command(SlashCommand::Exit));
        assert_eq!(parse_input("q"), InputAction::Command(SlashCommand::Exit));
    }

    #[test]
    fn test_exit_word_inside_prompt_is_prompt() {
        assert_eq!(
            parse_input("quit smoking tips"),
            InputAction::Prompt("quit smoking tips".to_string())
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_input("/help"), InputAction::Command(SlashCommand::Help));
        assert_eq!(parse_input("/clear"), InputAction::Command(SlashCommand::Clear));
        assert_eq!(
            parse_input("/compact"),
            InputAction::Command(SlashCommand::Compact)
        );
        assert_eq!(parse_input("/exit"), InputAction::Command(SlashCommand::Exit));
        assert_eq!(parse_input("/quit"), InputAction::Command(SlashCommand::Exit));
    }

    #[test]
    fn test_parse_model_commands() {
        assert_eq!(
            parse_input("/model"),
            InputAction::Command(SlashCommand::ModelList)
        );
        assert_eq!(
            parse_input("/model claude-test"),
            InputAction::Command(SlashCommand::ModelSwitch("claude-test".to_string()))
        );
        assert_eq!(
            parse_input("/model azure/gpt-4o"),
            InputAction::Command(SlashCommand::ModelSwitch("azure/gpt-4o".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_input("/dance"),
            InputAction::Command(SlashCommand::Unknown("dance".to_string()))
        );
    }

    #[test]
    fn test_split_model_switch() {
        assert_eq!(split_model_switch("claude-test"), (None, "claude-test"));
        assert_eq!(
            split_model_switch("azure/gpt-4o"),
            (Some("azure"), "gpt-4o")
        );
        // A leading or trailing slash is not a provider switch.
        assert_eq!(split_model_switch("/gpt"), (None, "/gpt"));
        assert_eq!(split_model_switch("azure/"), (None, "azure/"));
    }

    #[test]
    fn test_help_text_lists_commands() {
        let help = help_text();
        for command in ["/help", "/clear", "/compact", "/model", "/exit"] {
            assert!(help.contains(command));
        }
    }
}
