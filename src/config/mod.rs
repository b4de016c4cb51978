// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Configuration for CaretForge

pub mod redact;
pub mod settings;

pub use redact::{is_secret_key, redact, redact_json};
pub use settings::{Config, ProviderConfig, ProviderKind, ResolvedProvider};
