// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! CaretForge - AI coding agent for your terminal
//!
//! Entry point: parse the CLI, load configuration, dispatch.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use caretforge::chat::{ChatSession, SessionOptions};
use caretforge::cli::{Cli, Commands, ConfigCommands, ModelCommands};
use caretforge::commands;
use caretforge::config::Config;
use caretforge::error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            caretforge::chat::display::print_error(&e);
            ExitCode::from(1)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Doctor reports a broken config instead of dying on it.
    if matches!(cli.command, Some(Commands::Doctor)) {
        let config = Config::load();
        let results = commands::doctor::run_checks(&config, &working_dir);
        let all_passed = commands::doctor::report(&results);
        return Ok(if all_passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            ConfigCommands::Init { with_secrets } => {
                commands::config::init(&Config::default_path(), *with_secrets)?;
                Ok(ExitCode::SUCCESS)
            }
            ConfigCommands::Show { json } => {
                let config = Config::load()?;
                commands::config::show(&config, *json)?;
                Ok(ExitCode::SUCCESS)
            }
        };
    }

    let config = Config::load()?;
    let options = SessionOptions {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        stream: cli.streaming(),
        json: cli.json,
        allow_write: cli.allow_write,
        allow_shell: cli.allow_shell,
    };

    match cli.command {
        None | Some(Commands::Chat) => {
            let mut session = ChatSession::new(config, &options, working_dir)?;
            session.run_repl().await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Run { task }) | Some(Commands::Task(task)) => {
            let task = task.join(" ");
            if task.trim().is_empty() {
                return Err(caretforge::CaretError::InvalidInput(
                    "no task given".to_string(),
                ));
            }
            let mut session = ChatSession::new(config, &options, working_dir)?;
            let code = session.run_once(&task).await;
            Ok(ExitCode::from(code as u8))
        }
        Some(Commands::Model { command }) => match command {
            ModelCommands::List => {
                let resolved = config.resolve_provider(options.provider.as_deref())?;
                println!("Models for provider '{}':", resolved.name);
                for model in resolved.provider.list_models() {
                    match model.description {
                        Some(description) => println!("  {}  ({})", model.id, description),
                        None => println!("  {}", model.id),
                    }
                }
                Ok(ExitCode::SUCCESS)
            }
        },
        Some(Commands::Config { .. }) | Some(Commands::Doctor) => unreachable!(),
    }
}
