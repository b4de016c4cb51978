// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Provider adapter implementations
//!
//! Four adapters share the [`crate::llm::provider::ChatProvider`] contract
//! but speak different wire protocols. Each converts canonical messages to
//! its wire form, performs one POST, and parses either a single JSON
//! response or an SSE byte stream.

pub mod anthropic;
pub mod openai_chat;
pub mod responses;
pub mod thread_run;

pub use anthropic::AnthropicProvider;
pub use openai_chat::OpenAiChatProvider;
pub use responses::ResponsesProvider;
pub use thread_run::ThreadRunProvider;

use crate::error::{ApiError, CaretError};

/// Longest response-body prefix carried on a non-2xx provider error.
const ERROR_BODY_PREFIX: usize = 600;

/// Build the provider error for a non-success HTTP status.
pub(crate) fn status_error(status: u16, body: &str) -> CaretError {
    let prefix: String = body.chars().take(ERROR_BODY_PREFIX).collect();
    if status == 401 || status == 403 {
        CaretError::Api(ApiError::AuthenticationFailed(prefix))
    } else {
        CaretError::Api(ApiError::ServerError {
            status,
            message: prefix,
        })
    }
}
