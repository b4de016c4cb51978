// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! CLI argument definitions using Clap
//!
//! Bare positional words that are not a subcommand become a one-shot task,
//! so `caretforge fix the tests` behaves like `caretforge run fix the
//! tests`.

use clap::{Parser, Subcommand};

/// CaretForge - bring-your-own-model AI coding agent for your terminal
#[derive(Parser, Debug)]
#[command(name = "caretforge")]
#[command(version, about = "AI coding agent for your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Provider to use (overrides the configured default)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// Model to use (overrides the provider default)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Stream tokens as they arrive (default)
    #[arg(long, global = true, overrides_with = "no_stream")]
    pub stream: bool,

    /// Disable streaming output
    #[arg(long, global = true)]
    pub no_stream: bool,

    /// Emit one JSON object per turn instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose tracing output
    #[arg(long, global = true)]
    pub trace: bool,

    /// Pre-approve shell commands for this session
    #[arg(long, global = true)]
    pub allow_shell: bool,

    /// Pre-approve file writes for this session
    #[arg(long, global = true)]
    pub allow_write: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Resolve the streaming flag: on by default, `--no-stream` wins.
    pub fn streaming(&self) -> bool {
        !self.no_stream
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default when no command given)
    Chat,

    /// Run a single task non-interactively
    Run {
        /// The task, in natural language
        #[arg(trailing_var_arg = true)]
        task: Vec<String>,
    },

    /// Model management
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Check the local setup and configuration
    Doctor,

    /// Bare words: treated as a one-shot task
    #[command(external_subcommand)]
    Task(Vec<String>),
}

/// Model subcommands
#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    /// List the models of the selected provider
    List,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter config file
    Init {
        /// Include placeholder secrets in the template
        #[arg(long)]
        with_secrets: bool,
    },

    /// Show the effective configuration (secrets redacted)
    Show {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}
