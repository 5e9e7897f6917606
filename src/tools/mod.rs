// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Otto
//!
//! Provides the framework for tools that the model can call: the [`Tool`]
//! trait, the registry of built-in tools, and the dispatcher that turns
//! tool-call requests into observation strings.
//!
//! Tools that modify files do not write anything themselves. They return
//! [`ToolOutcome::ConfirmationRequired`] and the dispatcher performs the
//! write only after the operator approves it at the terminal.

pub mod builtin;
pub mod confirm;
pub mod definition;
pub mod dispatcher;

pub use confirm::*;
pub use definition::*;
pub use dispatcher::*;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;

/// Context provided to tools during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Directory relative paths resolve against
    pub working_directory: PathBuf,
    /// SQLite database queried by `query_database`
    pub database_path: Option<PathBuf>,
    /// Brave Search API key, if configured
    pub search_api_key: Option<String>,
    /// Extra commands allowed through the shell allowlist
    pub extra_allowed_commands: Vec<String>,
    /// Shared HTTP client for network tools
    pub http_client: reqwest::Client,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("working_directory", &self.working_directory)
            .field("database_path", &self.database_path)
            .field("has_search_api_key", &self.search_api_key.is_some())
            .field("extra_allowed_commands", &self.extra_allowed_commands)
            .finish()
    }
}

impl ToolContext {
    /// Create a context rooted at the given working directory.
    pub fn new(working_directory: PathBuf) -> Self {
        Self {
            working_directory,
            database_path: None,
            search_api_key: None,
            extra_allowed_commands: Vec::new(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_database_path(mut self, path: PathBuf) -> Self {
        self.database_path = Some(path);
        self
    }

    pub fn with_search_api_key(mut self, key: Option<String>) -> Self {
        self.search_api_key = key;
        self
    }

    pub fn with_extra_allowed_commands(mut self, commands: Vec<String>) -> Self {
        self.extra_allowed_commands = commands;
        self
    }

    /// Resolve a path against the working directory, refusing escapes.
    ///
    /// Relative paths join onto the working directory; `..` components are
    /// normalized lexically so `sub/../../etc/passwd` is caught without the
    /// target needing to exist.
    pub fn resolve_within_workdir(&self, path: &str) -> std::result::Result<PathBuf, String> {
        let raw = PathBuf::from(path);
        let joined = if raw.is_absolute() {
            raw
        } else {
            self.working_directory.join(raw)
        };

        let normalized = normalize_lexically(&joined);
        if normalized.starts_with(&self.working_directory) {
            Ok(normalized)
        } else {
            Err(format!(
                "Path '{}' escapes the working directory '{}'",
                path,
                self.working_directory.display()
            ))
        }
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// What kind of write a confirmation gate protects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    /// Create or overwrite a file with new content
    WriteFile,
}

impl std::fmt::Display for ConfirmationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationKind::WriteFile => write!(f, "write file"),
        }
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// The tool ran and produced output for the model
    Success(String),
    /// The tool needs operator approval before the side effect happens.
    /// The tool itself has not touched the filesystem yet.
    ConfirmationRequired {
        kind: ConfirmationKind,
        path: PathBuf,
        payload: String,
    },
    /// The tool ran but the operation failed in an expected way
    Failure(String),
}

impl ToolOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        ToolOutcome::Success(text.into())
    }

    pub fn failure(text: impl Into<String>) -> Self {
        ToolOutcome::Failure(text.into())
    }
}

/// Audit entry for one tool dispatch
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallRecord {
    /// Name the model asked for
    pub tool_name: String,
    /// Arguments as they arrived
    pub tool_args: Value,
    /// Result string handed back to the model
    pub result: String,
}

impl ToolCallRecord {
    pub fn new(tool_name: impl Into<String>, tool_args: Value, result: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_args,
            result: result.into(),
        }
    }
}

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical tool name
    fn name(&self) -> &str;

    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Expected failures come back as
    /// [`ToolOutcome::Failure`]; `Err` is reserved for unexpected ones.
    /// Neither escapes the dispatcher.
    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome>;
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with all built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(builtin::ReadFileTool));
        registry.register(Arc::new(builtin::WriteFileTool));
        registry.register(Arc::new(builtin::ListDirectoryTool));
        registry.register(Arc::new(builtin::CreateDirectoryTool));
        registry.register(Arc::new(builtin::ExecuteShellCommandTool::new()));
        registry.register(Arc::new(builtin::WebSearchTool::new()));
        registry.register(Arc::new(builtin::QueryDatabaseTool));

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
