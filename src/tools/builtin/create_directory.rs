// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directory creation tool

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

/// Tool for creating directories
pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_directory".to_string(),
            description: "Create a directory, including any missing parent directories."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Directory path to create", true)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let Some(path_str) = args["path"]
            .as_str()
            .or_else(|| args["directory"].as_str())
            .or_else(|| args["dir"].as_str())
        else {
            return Ok(ToolOutcome::failure("'path' argument is required"));
        };

        let path = match context.resolve_within_workdir(path_str) {
            Ok(path) => path,
            Err(message) => return Ok(ToolOutcome::failure(message)),
        };

        if path.is_dir() {
            return Ok(ToolOutcome::success(format!(
                "Directory already exists: {}",
                path.display()
            )));
        }

        match std::fs::create_dir_all(&path) {
            Ok(()) => Ok(ToolOutcome::success(format!(
                "Created directory {}",
                path.display()
            ))),
            Err(e) => Ok(ToolOutcome::failure(format!(
                "Failed to create {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
