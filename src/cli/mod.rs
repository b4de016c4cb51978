// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Command-line interface definitions

pub mod args;

pub use args::{Cli, Commands, ConfigCommands, ModelCommands};
