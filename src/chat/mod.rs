// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Chat layer: agent loop, streaming accumulation, and the session driver

pub mod display;
pub mod engine;
pub mod input;
pub mod session;
pub mod slash_commands;
pub mod streaming;

pub use engine::{run_agent_loop, AgentObserver, AgentOutcome};
pub use session::{ChatSession, SessionOptions};
pub use streaming::StreamAccumulator;
