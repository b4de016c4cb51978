// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Configuration schema and loading
//!
//! The config file is JSON at the platform config directory
//! (`caretforge/config.json`). Precedence: CLI flags > environment
//! variables > config file > defaults. Schema validation happens on load so
//! a bad file fails at startup, not mid-turn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{CaretError, Result};
use crate::llm::provider::ChatProvider;
use crate::llm::providers::{
    AnthropicProvider, OpenAiChatProvider, ResponsesProvider, ThreadRunProvider,
};
use crate::llm::providers::thread_run::ThreadRunAuth;

/// Which wire protocol a provider entry speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-style deployment-scoped chat completions
    OpenaiChat,
    /// Anthropic Messages
    Anthropic,
    /// OpenAI Responses
    Responses,
    /// Asynchronous thread/run backend
    ThreadRun,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenaiChat => write!(f, "openai_chat"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Responses => write!(f, "responses"),
            ProviderKind::ThreadRun => write!(f, "thread_run"),
        }
    }
}

/// One configured provider backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Wire protocol
    pub kind: ProviderKind,

    /// Base endpoint URL
    pub endpoint: String,

    /// Credential; optional because thread_run can use the CLI credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API version query parameter (openai_chat)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Models/deployments this entry serves; the first is the default
    #[serde(default)]
    pub models: Vec<String>,

    /// Acquire a bearer token by spawning the platform CLI (thread_run)
    #[serde(default)]
    pub use_cli_credential: bool,
}

/// The application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Provider used when `--provider` is absent
    #[serde(default)]
    pub default_provider: String,

    /// Configured backends keyed by name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Whether anonymous usage reporting is enabled
    #[serde(default)]
    pub telemetry: bool,
}

impl Config {
    /// Platform-dependent config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caretforge")
            .join("config.json")
    }

    /// Load from the default path; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load, apply env overrides, and validate.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&content)
                .map_err(|e| CaretError::Config(format!("invalid config file: {}", e)))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save to a specific path, creating parent directories.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Map known environment variables onto config paths.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("CARETFORGE_PROVIDER") {
            if !provider.is_empty() {
                self.default_provider = provider;
            }
        }
        if let Ok(telemetry) = std::env::var("CARETFORGE_TELEMETRY") {
            self.telemetry = matches!(telemetry.as_str(), "1" | "true" | "yes");
        }
        let names: Vec<String> = self.providers.keys().cloned().collect();
        for name in names {
            let env_name = name.to_uppercase().replace('-', "_");
            if let Ok(key) = std::env::var(format!("CARETFORGE_{}_API_KEY", env_name)) {
                if !key.is_empty() {
                    if let Some(entry) = self.providers.get_mut(&name) {
                        entry.api_key = Some(key);
                    }
                }
            }
            if let Ok(endpoint) = std::env::var(format!("CARETFORGE_{}_ENDPOINT", env_name)) {
                if !endpoint.is_empty() {
                    if let Some(entry) = self.providers.get_mut(&name) {
                        entry.endpoint = endpoint;
                    }
                }
            }
        }
    }

    /// Schema validation beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        if !self.default_provider.is_empty() && !self.providers.contains_key(&self.default_provider)
        {
            return Err(CaretError::Config(format!(
                "defaultProvider '{}' is not in the providers map",
                self.default_provider
            )));
        }
        for (name, provider) in &self.providers {
            if provider.endpoint.trim().is_empty() {
                return Err(CaretError::Config(format!(
                    "provider '{}' has an empty endpoint",
                    name
                )));
            }
            if provider.api_key.is_none()
                && !(provider.kind == ProviderKind::ThreadRun && provider.use_cli_credential)
            {
                return Err(CaretError::Config(format!(
                    "provider '{}' has no apiKey (set CARETFORGE_{}_API_KEY or add it to the config)",
                    name,
                    name.to_uppercase().replace('-', "_")
                )));
            }
        }
        Ok(())
    }

    /// Resolve a provider by name (or the default), constructing the adapter.
    pub fn resolve_provider(&self, name: Option<&str>) -> Result<ResolvedProvider> {
        let name = match name {
            Some(name) => name.to_string(),
            None if !self.default_provider.is_empty() => self.default_provider.clone(),
            None => {
                return Err(CaretError::Config(
                    "no provider selected: pass --provider or set defaultProvider".to_string(),
                ))
            }
        };

        let entry = self.providers.get(&name).ok_or_else(|| {
            CaretError::Config(format!("provider '{}' is not configured", name))
        })?;

        let provider: Box<dyn ChatProvider> = match entry.kind {
            ProviderKind::OpenaiChat => Box::new(OpenAiChatProvider::new(
                &entry.endpoint,
                entry.api_key.clone().unwrap_or_default(),
                entry.api_version.clone().unwrap_or_else(|| "2024-06-01".to_string()),
                entry.models.clone(),
            )),
            ProviderKind::Anthropic => Box::new(AnthropicProvider::new(
                &entry.endpoint,
                entry.api_key.clone().unwrap_or_default(),
                entry.models.clone(),
            )),
            ProviderKind::Responses => Box::new(ResponsesProvider::new(
                &entry.endpoint,
                entry.api_key.clone().unwrap_or_default(),
                entry.models.clone(),
            )),
            ProviderKind::ThreadRun => {
                let auth = if entry.use_cli_credential {
                    ThreadRunAuth::CliCredential
                } else {
                    ThreadRunAuth::ApiKey(entry.api_key.clone().unwrap_or_default())
                };
                Box::new(ThreadRunProvider::new(&entry.endpoint, auth, entry.models.clone()))
            }
        };

        let default_model = std::env::var("CARETFORGE_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| entry.models.first().cloned());

        Ok(ResolvedProvider {
            name,
            provider,
            default_model,
        })
    }

    /// A starter config for `config init`.
    pub fn template(with_secrets: bool) -> Self {
        let key = |placeholder: &str| {
            if with_secrets {
                Some(placeholder.to_string())
            } else {
                None
            }
        };
        let mut providers = BTreeMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderConfig {
                kind: ProviderKind::Anthropic,
                endpoint: "https://api.anthropic.com".to_string(),
                api_key: key("sk-ant-..."),
                api_version: None,
                models: vec!["claude-sonnet-4-20250514".to_string()],
                use_cli_credential: false,
            },
        );
        providers.insert(
            "azure".to_string(),
            ProviderConfig {
                kind: ProviderKind::OpenaiChat,
                endpoint: "https://YOUR-RESOURCE.openai.azure.com".to_string(),
                api_key: key("..."),
                api_version: Some("2024-06-01".to_string()),
                models: vec!["gpt-4o".to_string()],
                use_cli_credential: false,
            },
        );
        providers.insert(
            "agents".to_string(),
            ProviderConfig {
                kind: ProviderKind::ThreadRun,
                endpoint: "https://YOUR-PROJECT.services.ai.azure.com/api/projects/YOUR-PROJECT"
                    .to_string(),
                api_key: None,
                api_version: None,
                models: vec!["my-agent".to_string()],
                use_cli_credential: true,
            },
        );
        Config {
            default_provider: "anthropic".to_string(),
            providers,
            telemetry: false,
        }
    }
}

/// Outcome of provider resolution
pub struct ResolvedProvider {
    /// Configured provider name
    pub name: String,
    /// The constructed adapter
    pub provider: Box<dyn ChatProvider>,
    /// Model to use when `--model` is absent
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}
