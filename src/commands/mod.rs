// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Subcommand implementations that do not need a chat session

pub mod config;
pub mod doctor;
