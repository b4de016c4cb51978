// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 CaretForge Contributors

//! Built-in tools

mod edit_file;
mod glob_find;
mod grep_search;
mod read_file;
mod shell;
mod write_file;

pub use edit_file::EditFileTool;
pub use glob_find::GlobFindTool;
pub use grep_search::GrepSearchTool;
pub use read_file::ReadFileTool;
pub use shell::ExecShellTool;
pub use write_file::WriteFileTool;
