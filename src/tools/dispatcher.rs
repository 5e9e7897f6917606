// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool dispatch
//!
//! Turns a requested tool call into an observation string for the model.
//! Dispatch never fails: unknown tools, tool errors, and operator denials
//! all come back as strings the model can read and react to.

use serde_json::Value;
use std::sync::Arc;

use super::{
    confirm::describe_write, ConfirmationKind, ConfirmationPrompt, ToolCallRecord, ToolContext,
    ToolOutcome, ToolRegistry,
};
use crate::llm::provider::ToolDefinition;

/// Executes tool calls and keeps the audit log
pub struct ToolDispatcher {
    registry: ToolRegistry,
    context: ToolContext,
    prompt: Arc<dyn ConfirmationPrompt>,
    /// Spinner to suspend while the operator is being prompted
    spinner: Option<indicatif::ProgressBar>,
    dry_run: bool,
    log: Vec<ToolCallRecord>,
}

impl ToolDispatcher {
    pub fn new(
        registry: ToolRegistry,
        context: ToolContext,
        prompt: Arc<dyn ConfirmationPrompt>,
    ) -> Self {
        Self {
            registry,
            context,
            prompt,
            spinner: None,
            dry_run: false,
            log: Vec::new(),
        }
    }

    /// Replace real execution with synthetic observations
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Attach a status spinner that gets suspended during confirmation
    pub fn with_spinner(mut self, spinner: indicatif::ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    /// Definitions of every registered tool, for the model request
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Audit log of every dispatch so far
    pub fn records(&self) -> &[ToolCallRecord] {
        &self.log
    }

    /// Drain the audit log
    pub fn take_records(&mut self) -> Vec<ToolCallRecord> {
        std::mem::take(&mut self.log)
    }

    /// Execute one requested tool call and return the observation string.
    pub async fn dispatch(&mut self, name: &str, args: &Value) -> String {
        let result = self.dispatch_inner(name, args).await;

        tracing::debug!(
            target: "otto.tools.dispatch",
            tool = name,
            dry_run = self.dry_run,
            result_len = result.len(),
            "tool dispatched"
        );

        self.log
            .push(ToolCallRecord::new(name, args.clone(), result.clone()));
        result
    }

    async fn dispatch_inner(&mut self, name: &str, args: &Value) -> String {
        if self.dry_run {
            return format!("[dry-run] Would have called '{}' with {}", name, args);
        }

        let Some(tool) = self.registry.get(name).cloned() else {
            return format!(
                "Error: tool '{}' is not registered. Available tools: {}.",
                name,
                self.available_names()
            );
        };

        match tool.invoke(args.clone(), &self.context).await {
            Ok(ToolOutcome::Success(text)) => text,
            Ok(ToolOutcome::Failure(message)) => {
                format!("Error executing tool '{}': {}", name, message)
            }
            Ok(ToolOutcome::ConfirmationRequired {
                kind,
                path,
                payload,
            }) => self.run_confirmation_gate(name, kind, path, payload),
            Err(e) => format!("Error executing tool '{}': {}", name, e),
        }
    }

    /// Prompt the operator and, on approval, perform the gated write.
    fn run_confirmation_gate(
        &self,
        tool_name: &str,
        kind: ConfirmationKind,
        path: std::path::PathBuf,
        payload: String,
    ) -> String {
        let description = match kind {
            ConfirmationKind::WriteFile => describe_write(&path, &payload),
        };

        let approved = match &self.spinner {
            Some(spinner) => spinner.suspend(|| self.prompt.confirm(&description, &payload)),
            None => self.prompt.confirm(&description, &payload),
        };

        match approved {
            Ok(true) => self.perform_write(kind, &path, &payload),
            Ok(false) => {
                tracing::info!(
                    target: "otto.tools.dispatch",
                    tool = tool_name,
                    path = %path.display(),
                    "operation denied by user"
                );
                "Operation denied by user.".to_string()
            }
            Err(e) => format!(
                "Error executing tool '{}': confirmation prompt failed: {}",
                tool_name, e
            ),
        }
    }

    fn perform_write(&self, kind: ConfirmationKind, path: &std::path::Path, payload: &str) -> String {
        match kind {
            ConfirmationKind::WriteFile => {
                if let Some(parent) = path.parent() {
                    if !parent.exists() {
                        if let Err(e) = std::fs::create_dir_all(parent) {
                            return format!(
                                "Error writing '{}': could not create parent directories: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
                match std::fs::write(path, payload) {
                    Ok(()) => format!(
                        "Successfully wrote {} ({} bytes)",
                        path.display(),
                        payload.len()
                    ),
                    Err(e) => format!("Error writing '{}': {}", path.display(), e),
                }
            }
        }
    }

    fn available_names(&self) -> String {
        let mut names = self.registry.names();
        names.sort_unstable();
        names.join(", ")
    }
}
