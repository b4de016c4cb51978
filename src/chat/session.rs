// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Session driver
//!
//! Owns the conversation, the permission state and the provider for one
//! REPL session or one-shot invocation, and drives the agent loop per user
//! turn. Provider errors end the turn, not the session.

use serde::Serialize;
use serde_json::Value;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use crate::chat::display;
use crate::chat::engine::{run_agent_loop, AgentObserver};
use crate::chat::input::{self, ReadOutcome};
use crate::chat::slash_commands::{
    help_text, parse_input, split_model_switch, InputAction, SlashCommand, COMPACT_KEEP,
};
use crate::config::Config;
use crate::error::{CaretError, Result};
use crate::indexer::{expand_references, FileIndex};
use crate::llm::message::{Conversation, Message};
use crate::llm::provider::ChatProvider;
use crate::tools::{PermissionManager, ToolContext, ToolRegistry, ToolResult};

/// Options distilled from the CLI for one session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub stream: bool,
    pub json: bool,
    pub allow_write: bool,
    pub allow_shell: bool,
}

/// One REPL session or one-shot invocation
pub struct ChatSession {
    config: Config,
    provider_name: String,
    provider: Box<dyn ChatProvider>,
    model: String,
    stream: bool,
    json: bool,
    permissions: PermissionManager,
    registry: ToolRegistry,
    context: ToolContext,
    /// Conversation prefix without the system message; the loop prepends
    /// its own.
    prefix: Conversation,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Resolve the provider and model and set up session state.
    pub fn new(config: Config, options: &SessionOptions, root: PathBuf) -> Result<Self> {
        let resolved = config.resolve_provider(options.provider.as_deref())?;
        let model = options
            .model
            .clone()
            .or(resolved.default_model)
            .ok_or_else(|| {
                CaretError::Config(
                    "no model selected: pass --model or configure models for the provider"
                        .to_string(),
                )
            })?;

        let mut permissions = PermissionManager::new(options.allow_write, options.allow_shell);
        if options.json {
            // JSON mode never prompts; denials come back as tool results.
            permissions = permissions.with_interactive(false);
        }

        Ok(Self {
            config,
            provider_name: resolved.name,
            provider: resolved.provider,
            model,
            stream: options.stream,
            json: options.json,
            permissions,
            registry: ToolRegistry::with_builtins(),
            context: ToolContext::new(root),
            prefix: Conversation::new(),
        })
    }

    /// The active model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The active provider name (config key).
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Run the interactive REPL.
    pub async fn run_repl(&mut self) -> Result<()> {
        if io::stdin().is_terminal() {
            display::print_disclaimer();
        }
        display::print_banner(&self.provider_name, &self.model);

        let index = FileIndex::build(&self.context.working_directory).await;
        display::print_index_summary(index.len(), index.stats().timed_out);

        loop {
            match input::read_line("> ", &index)? {
                ReadOutcome::Interrupted | ReadOutcome::Eof => break,
                ReadOutcome::Line(line) => match parse_input(&line) {
                    InputAction::Empty => continue,
                    InputAction::Command(SlashCommand::Exit) => break,
                    InputAction::Command(command) => self.handle_command(command),
                    InputAction::Prompt(prompt) => {
                        if let Err(e) = self.run_turn(&prompt, &index).await {
                            display::print_error(&e);
                        }
                    }
                },
            }
        }

        Ok(())
    }

    /// Run one non-interactive task. Returns the process exit code.
    pub async fn run_once(&mut self, task: &str) -> i32 {
        let index = FileIndex::build(&self.context.working_directory).await;

        match self.run_turn(task, &index).await {
            Ok(()) => 0,
            Err(e) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::json!({ "error": format!("[{}] {}", e.code(), e) })
                    );
                } else {
                    display::print_error(&e);
                }
                1
            }
        }
    }

    /// One user turn: expand references, run the loop, update the prefix.
    async fn run_turn(&mut self, prompt: &str, index: &FileIndex) -> Result<()> {
        let expanded = expand_references(prompt, index);
        self.prefix.push(Message::user(expanded.prompt));

        let mut observer = CliObserver {
            permissions: &mut self.permissions,
            quiet: self.json,
            streaming: self.stream,
        };

        let outcome = run_agent_loop(
            self.provider.as_ref(),
            &self.model,
            &self.prefix.messages,
            &self.registry,
            &self.context,
            self.stream,
            &mut observer,
        )
        .await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // Leave the conversation as it was before the failed turn.
                self.prefix.messages.pop();
                return Err(e);
            }
        };

        if self.json {
            let report = TurnReport {
                task: prompt,
                model: &self.model,
                provider: &self.provider_name,
                final_content: &outcome.final_content,
                tool_call_count: outcome.tool_call_count,
                duration_ms: outcome.duration_ms,
                messages: &outcome.conversation,
            };
            println!("{}", serde_json::to_string(&report)?);
        } else if self.stream {
            println!();
        } else {
            println!("{}", outcome.final_content);
        }

        // Keep everything after the system message for the next turn.
        self.prefix.messages = outcome.conversation.into_iter().skip(1).collect();
        Ok(())
    }

    fn handle_command(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Help => println!("{}", help_text()),
            SlashCommand::Clear => {
                self.prefix.messages.clear();
                println!("Conversation cleared.");
            }
            SlashCommand::Compact => {
                let removed = self.prefix.compact(COMPACT_KEEP);
                println!("Compacted: removed {} messages.", removed);
            }
            SlashCommand::ModelList => {
                for model in self.provider.list_models() {
                    match model.description {
                        Some(description) => println!("  {}  ({})", model.id, description),
                        None => println!("  {}", model.id),
                    }
                }
            }
            SlashCommand::ModelSwitch(argument) => {
                let (provider, model) = split_model_switch(&argument);
                if let Some(provider_name) = provider {
                    match self.config.resolve_provider(Some(provider_name)) {
                        Ok(resolved) => {
                            self.provider_name = resolved.name;
                            self.provider = resolved.provider;
                        }
                        Err(e) => {
                            display::print_error(&e);
                            return;
                        }
                    }
                }
                self.model = model.to_string();
                println!("Now using {} / {}", self.provider_name, self.model);
            }
            SlashCommand::Exit => {}
            SlashCommand::Unknown(name) => {
                println!("Unknown command: /{} (try /help)", name);
            }
        }
    }
}

/// Observer wiring loop events to the terminal and the permission manager.
struct CliObserver<'a> {
    permissions: &'a mut PermissionManager,
    quiet: bool,
    streaming: bool,
}

impl AgentObserver for CliObserver<'_> {
    fn on_token(&mut self, text: &str) -> Result<()> {
        if !self.quiet && self.streaming {
            let mut stdout = io::stdout();
            write!(stdout, "{}", text)?;
            stdout.flush()?;
        }
        Ok(())
    }

    fn on_tool_call(&mut self, name: &str, args: &Value) -> Result<()> {
        if !self.quiet {
            display::print_tool_call(name, args);
        }
        Ok(())
    }

    fn on_tool_result(&mut self, _name: &str, result: &ToolResult) -> Result<()> {
        if !self.quiet {
            display::print_tool_result(result);
        }
        Ok(())
    }

    fn on_permission_request(&mut self, name: &str, args: &Value) -> bool {
        self.permissions.check(name, args)
    }
}

/// The `--json` turn report
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnReport<'a> {
    task: &'a str,
    model: &'a str,
    provider: &'a str,
    final_content: &'a str,
    tool_call_count: usize,
    duration_ms: u64,
    messages: &'a [Message],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, ProviderKind};
    use std::collections::BTreeMap;

    fn config() -> Config {
        let mut providers = BTreeMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                kind: ProviderKind::Anthropic,
                endpoint: "https://api.anthropic.com".to_string(),
                api_key: Some("sk-test".to_string()),
                api_version: None,
                models: vec!["claude-test".to_string()],
                use_cli_credential: false,
            },
        );
        Config {
            default_provider: "anthropic".to_string(),
            providers,
            telemetry: false,
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            stream: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_session_resolves_default_model() {
        let session = ChatSession::new(config(), &options(), PathBuf::from("/tmp")).unwrap();
        assert_eq!(session.model(), "claude-test");
        assert_eq!(session.provider_name(), "anthropic");
    }

    #[test]
    fn test_session_model_override() {
        let opts = SessionOptions {
            model: Some("claude-other".to_string()),
            ..options()
        };
        let session = ChatSession::new(config(), &opts, PathBuf::from("/tmp")).unwrap();
        assert_eq!(session.model(), "claude-other");
    }

    #[test]
    fn test_session_no_model_is_config_error() {
        let mut cfg = config();
        cfg.providers.get_mut("anthropic").unwrap().models.clear();
        let err = ChatSession::new(cfg, &options(), PathBuf::from("/tmp")).unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn test_session_unknown_provider_is_config_error() {
        let opts = SessionOptions {
            provider: Some("ghost".to_string()),
            ..options()
        };
        let err = ChatSession::new(config(), &opts, PathBuf::from("/tmp")).unwrap_err();
        assert_eq!(err.code(), "config_error");
    }

    #[test]
    fn test_model_switch_same_provider() {
        let mut session = ChatSession::new(config(), &options(), PathBuf::from("/tmp")).unwrap();
        session.handle_command(SlashCommand::ModelSwitch("claude-new".to_string()));
        assert_eq!(session.model(), "claude-new");
        assert_eq!(session.provider_name(), "anthropic");
    }

    #[test]
    fn test_model_switch_with_provider() {
        let mut cfg = config();
        cfg.providers.insert(
            "azure".to_string(),
            ProviderConfig {
                kind: ProviderKind::OpenaiChat,
                endpoint: "https://x.openai.azure.com".to_string(),
                api_key: Some("k".to_string()),
                api_version: None,
                models: vec!["gpt-4o".to_string()],
                use_cli_credential: false,
            },
        );
        let mut session = ChatSession::new(cfg, &options(), PathBuf::from("/tmp")).unwrap();

        session.handle_command(SlashCommand::ModelSwitch("azure/gpt-4o".to_string()));
        assert_eq!(session.provider_name(), "azure");
        assert_eq!(session.model(), "gpt-4o");
    }

    #[test]
    fn test_clear_resets_prefix() {
        let mut session = ChatSession::new(config(), &options(), PathBuf::from("/tmp")).unwrap();
        session.prefix.push(Message::user("a"));
        session.prefix.push(Message::assistant("b"));

        session.handle_command(SlashCommand::Clear);
        assert!(session.prefix.is_empty());
    }

    #[test]
    fn test_compact_keeps_tail() {
        let mut session = ChatSession::new(config(), &options(), PathBuf::from("/tmp")).unwrap();
        for i in 0..10 {
            session.prefix.push(Message::user(format!("m{}", i)));
        }

        session.handle_command(SlashCommand::Compact);
        assert_eq!(session.prefix.len(), COMPACT_KEEP);
        assert_eq!(session.prefix.messages[0].content, "m6");
    }

    #[test]
    fn test_turn_report_shape() {
        let report = TurnReport {
            task: "do things",
            model: "m",
            provider: "p",
            final_content: "done",
            tool_call_count: 2,
            duration_ms: 17,
            messages: &[],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["task"], "do things");
        assert_eq!(json["finalContent"], "done");
        assert_eq!(json["toolCallCount"], 2);
        assert_eq!(json["durationMs"], 17);
        assert!(json["messages"].is_array());
    }
}
