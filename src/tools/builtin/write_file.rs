// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File write tool
//!
//! Never writes anything itself. The outcome carries the resolved path and
//! content; the dispatcher performs the write after operator approval.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{ConfirmationKind, SchemaBuilder, Tool, ToolContext, ToolOutcome};

/// Tool for writing files behind the confirmation gate
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".to_string(),
            description: "Write content to a file, creating parent directories as needed. \
                          The user is asked to confirm before anything is written."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("path", "Path where the file should be written", true)
                .string("content", "Content to write", true)
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let Some(path_str) = args["path"]
            .as_str()
            .or_else(|| args["file"].as_str())
            .or_else(|| args["file_path"].as_str())
            .or_else(|| args["filepath"].as_str())
        else {
            return Ok(ToolOutcome::failure("'path' argument is required"));
        };

        let Some(content) = args["content"]
            .as_str()
            .or_else(|| args["text"].as_str())
            .or_else(|| args["body"].as_str())
            .or_else(|| args["data"].as_str())
        else {
            return Ok(ToolOutcome::failure("'content' argument is required"));
        };

        let path = match context.resolve_within_workdir(path_str) {
            Ok(path) => path,
            Err(message) => return Ok(ToolOutcome::failure(message)),
        };

        Ok(ToolOutcome::ConfirmationRequired {
            kind: ConfirmationKind::WriteFile,
            path,
            payload: content.to_string(),
        })
    }
}
