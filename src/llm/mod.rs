// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! LLM module for CaretForge
//!
//! Provides the canonical message model and the abstraction over the four
//! remote provider backends.

pub mod assembler;
pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod sse;

pub use assembler::ToolCallAssembler;
pub use message::*;
pub use mock_provider::{MockProvider, MockTurn};
pub use provider::*;
