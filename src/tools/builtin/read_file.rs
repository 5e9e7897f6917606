// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File read tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

/// Output limit so a huge file cannot blow up the conversation
const MAX_CONTENT_CHARS: usize = 100_000;

/// Tool for reading file contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".to_string(),
            description: "Read the contents of a file. Paths are relative to the working directory."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Path of the file to read", true)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        // Models sometimes use alternate parameter names
        let Some(path_str) = args["path"]
            .as_str()
            .or_else(|| args["file"].as_str())
            .or_else(|| args["file_path"].as_str())
            .or_else(|| args["filepath"].as_str())
        else {
            return Ok(ToolOutcome::failure("'path' argument is required"));
        };

        let path = match context.resolve_within_workdir(path_str) {
            Ok(path) => path,
            Err(message) => return Ok(ToolOutcome::failure(message)),
        };

        if !path.exists() {
            return Ok(ToolOutcome::failure(format!(
                "File not found: {}",
                path.display()
            )));
        }
        if path.is_dir() {
            return Ok(ToolOutcome::failure(format!(
                "'{}' is a directory, use list_directory instead",
                path.display()
            )));
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                if content.len() > MAX_CONTENT_CHARS {
                    let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
                    Ok(ToolOutcome::success(format!(
                        "{}\n... (truncated, {} of {} bytes shown)",
                        truncated,
                        truncated.len(),
                        content.len()
                    )))
                } else {
                    Ok(ToolOutcome::success(content))
                }
            }
            Err(e) => Ok(ToolOutcome::failure(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
