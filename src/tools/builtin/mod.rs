// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools

pub mod create_directory;
pub mod database;
pub mod list_directory;
pub mod read_file;
pub mod shell;
pub mod web_search;
pub mod write_file;

pub use create_directory::CreateDirectoryTool;
pub use database::QueryDatabaseTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use shell::ExecuteShellCommandTool;
pub use web_search::WebSearchTool;
pub use write_file::WriteFileTool;
