// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Credential redaction for display
//!
//! Values under secret-looking keys are shown as first 4 + `****` + last 2
//! when long enough to stay recognizable, otherwise fully masked.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static SECRET_KEY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)apikey",
        r"(?i)secret",
        r"(?i)password",
        r"(?i)token",
        r"(?i)credential",
        r"(?i)key$",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("secret key pattern must compile"))
    .collect()
});

/// Whether a config key holds a secret.
pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEY_PATTERNS.iter().any(|p| p.is_match(key))
}

/// Redact a secret value for display.
pub fn redact(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() >= 8 {
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 2..].iter().collect();
        format!("{}****{}", prefix, suffix)
    } else {
        "******".to_string()
    }
}

/// Deep-redact every secret-keyed string in a JSON value.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let redacted = match v {
                        Value::String(s) if is_secret_key(key) => Value::String(redact(s)),
                        other => redact_json(other),
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}
