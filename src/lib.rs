// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! CaretForge - bring-your-own-model AI coding agent for your terminal
//!
//! An interactive command-line agent: natural-language instructions go to a
//! remote LLM through one of four provider backends, tool calls the model
//! emits run against the local filesystem and shell behind a safety and
//! permission layer, and results feed back until the model produces a final
//! reply.

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod safety;
pub mod tools;

pub use error::{CaretError, Result};
