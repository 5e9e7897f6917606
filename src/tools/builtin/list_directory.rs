// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directory listing tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

const MAX_ENTRIES: usize = 500;

/// Tool for listing directory contents
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description: "List the entries of a directory. Directories get a trailing '/'. \
                          Defaults to the working directory."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Directory to list (default: working directory)", false)
                .integer("depth", "How many levels deep to descend (default: 1)", false)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let path_str = args["path"]
            .as_str()
            .or_else(|| args["directory"].as_str())
            .or_else(|| args["dir"].as_str())
            .unwrap_or(".");
        let depth = args["depth"].as_u64().unwrap_or(1).clamp(1, 10) as usize;

        let root = match context.resolve_within_workdir(path_str) {
            Ok(path) => path,
            Err(message) => return Ok(ToolOutcome::failure(message)),
        };

        if !root.is_dir() {
            return Ok(ToolOutcome::failure(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&root)
            .min_depth(1)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            if entry.file_type().is_dir() {
                entries.push(format!("{}/", relative));
            } else {
                entries.push(relative);
            }
            if entries.len() >= MAX_ENTRIES {
                entries.push(format!("... (more than {} entries)", MAX_ENTRIES));
                break;
            }
        }

        if entries.is_empty() {
            return Ok(ToolOutcome::success(format!(
                "{} is empty",
                root.display()
            )));
        }

        Ok(ToolOutcome::success(entries.join("\n")))
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
