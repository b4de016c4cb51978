// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! `config init` and `config show`

use std::path::PathBuf;

use crate::config::{redact_json, Config};
use crate::error::Result;

/// Write a starter config file; refuses to overwrite an existing one.
pub fn init(path: &PathBuf, with_secrets: bool) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    let template = Config::template(with_secrets);
    template.save_to(path)?;
    println!("Wrote starter config to {}", path.display());
    if !with_secrets {
        println!("Add API keys to the file or export CARETFORGE_<PROVIDER>_API_KEY.");
    }
    Ok(())
}

/// Show the effective configuration with secrets redacted.
pub fn show(config: &Config, json: bool) -> Result<()> {
    let value = redact_json(&serde_json::to_value(config)?);
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Config file: {}", Config::default_path().display());
    println!("Default provider: {}", or_unset(&config.default_provider));
    println!("Telemetry: {}", config.telemetry);
    println!("Providers:");
    for (name, provider) in &config.providers {
        println!("  {} ({})", name, provider.kind);
        println!("    endpoint: {}", provider.endpoint);
        if let Some(redacted) = value["providers"][name]["apiKey"].as_str() {
            println!("    apiKey: {}", redacted);
        }
        if !provider.models.is_empty() {
            println!("    models: {}", provider.models.join(", "));
        }
        if provider.use_cli_credential {
            println!("    auth: platform CLI credential");
        }
    }
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}
