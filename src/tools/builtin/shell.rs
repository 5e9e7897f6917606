// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shell command execution tool
//!
//! Commands run through an allowlist: every segment of a compound command
//! must start with an approved program. Output is captured, truncated, and
//! labelled so the model can tell stdout from stderr.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::Result;
use crate::llm::provider::ToolDefinition;
use crate::tools::{SchemaBuilder, Tool, ToolContext, ToolOutcome};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_STDOUT_CHARS: usize = 30_000;
const MAX_STDERR_CHARS: usize = 10_000;

/// Programs allowed without any configuration
const BASE_ALLOWED: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "wc", "echo", "pwd", "date", "which", "env",
    "sort", "uniq", "diff", "tree", "du", "file", "git", "cargo", "rustc", "python3", "python",
    "pip", "npm", "node", "make",
];

/// Tool for executing allowlisted shell commands
pub struct ExecuteShellCommandTool {
    allowed: HashSet<String>,
}

impl ExecuteShellCommandTool {
    pub fn new() -> Self {
        Self {
            allowed: BASE_ALLOWED.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// First program of each `;`, `&&`, `||` or `|` separated segment must
    /// pass the allowlist. Returns the offending program on rejection.
    fn first_disallowed<'a>(&self, command: &'a str, extra: &[String]) -> Option<&'a str> {
        for segment in command
            .split(|c| c == ';' || c == '|')
            .flat_map(|s| s.split("&&"))
        {
            let Some(program) = segment.split_whitespace().next() else {
                continue;
            };
            let program = program.trim_start_matches('(');
            if program.is_empty() {
                continue;
            }
            if !self.allowed.contains(program) && !extra.iter().any(|e| e == program) {
                return Some(program);
            }
        }
        None
    }
}

impl Default for ExecuteShellCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExecuteShellCommandTool {
    fn name(&self) -> &str {
        "execute_shell_command"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_shell_command".to_string(),
            description: "Execute a shell command in the working directory and return its \
                          output. Only allowlisted programs may run."
                .to_string(),
            input_schema: SchemaBuilder::new()
                .string("command", "The shell command to execute", true)
                .integer(
                    "timeout",
                    "Timeout in seconds (default: 30, max: 300)",
                    false,
                )
                .build(),
        }
    }

    async fn invoke(&self, args: Value, context: &ToolContext) -> Result<ToolOutcome> {
        let Some(command) = args["command"]
            .as_str()
            .or_else(|| args["cmd"].as_str())
            .or_else(|| args["run"].as_str())
        else {
            return Ok(ToolOutcome::failure("'command' argument is required"));
        };

        if command.trim().is_empty() {
            return Ok(ToolOutcome::failure("command is empty"));
        }

        if let Some(program) = self.first_disallowed(command, &context.extra_allowed_commands) {
            return Ok(ToolOutcome::failure(format!(
                "Command '{}' is not in the allowlist. Allowed programs can be extended in the \
                 settings file.",
                program
            )));
        }

        let timeout_secs = args["timeout"]
            .as_u64()
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);

        // stdin is closed so commands cannot hang waiting for input
        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&context.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return Ok(ToolOutcome::failure(format!(
                    "Failed to spawn command: {}",
                    e
                )))
            }
        };

        let output = match timeout(Duration::from_secs(timeout_secs), async {
            child.wait_with_output().await
        })
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(ToolOutcome::failure(format!(
                    "Failed to execute command: {}",
                    e
                )))
            }
            Err(_) => {
                return Ok(ToolOutcome::failure(format!(
                    "Command timed out after {} seconds",
                    timeout_secs
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut result = format!("Exit code: {}\n", exit_code);
        result.push_str("--- STDOUT ---\n");
        result.push_str(&truncate(&stdout, MAX_STDOUT_CHARS));
        result.push_str("\n--- STDERR ---\n");
        result.push_str(&truncate(&stderr, MAX_STDERR_CHARS));

        Ok(ToolOutcome::success(result))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.trim_end_matches('\n').to_string()
    } else {
        let kept: String = text.chars().take(max_chars).collect();
        format!("{}\n... (output truncated)", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> ToolContext {
        ToolContext::new(temp.path().to_path_buf())
    }

    #[test]
    fn test_allowlist_accepts_base_commands() {
        let tool = ExecuteShellCommandTool::new();
        assert!(tool.first_disallowed("ls -la", &[]).is_none());
        assert!(tool.first_disallowed("cat a.txt | grep foo", &[]).is_none());
        assert!(tool.first_disallowed("echo hi && pwd", &[]).is_none());
    }

    #[test]
    fn test_allowlist_rejects_unknown_program() {
        let tool = ExecuteShellCommandTool::new();
        assert_eq!(tool.first_disallowed("curl http://x", &[]), Some("curl"));
    }

    #[test]
    fn test_allowlist_checks_every_segment() {
        let tool = ExecuteShellCommandTool::new();
        assert_eq!(tool.first_disallowed("ls && rm -rf /", &[]), Some("rm"));
        assert_eq!(tool.first_disallowed("echo x; shutdown", &[]), Some("shutdown"));
        assert_eq!(tool.first_disallowed("cat f | nc host 80", &[]), Some("nc"));
    }

    #[test]
    fn test_allowlist_extra_commands() {
        let tool = ExecuteShellCommandTool::new();
        let extra = vec!["terraform".to_string()];
        assert!(tool.first_disallowed("terraform plan", &extra).is_none());
        assert_eq!(tool.first_disallowed("terraform plan", &[]), Some("terraform"));
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let temp = TempDir::new().unwrap();
        let outcome = ExecuteShellCommandTool::new()
            .invoke(
                serde_json::json!({"command": "echo hello-from-shell"}),
                &context(&temp),
            )
            .await
            .unwrap();

        match outcome {
            ToolOutcome::Success(output) => {
                assert!(output.contains("Exit code: 0"));
                assert!(output.contains("--- STDOUT ---"));
                assert!(output.contains("hello-from-shell"));
                assert!(output.contains("--- STDERR ---"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_runs_in_working_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();

        let outcome = ExecuteShellCommandTool::new()
            .invoke(serde_json::json!({"command": "ls"}), &context(&temp))
            .await
            .unwrap();

        match outcome {
            ToolOutcome::Success(output) => assert!(output.contains("marker.txt")),
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit_is_still_success_outcome() {
        let temp = TempDir::new().unwrap();
        let outcome = ExecuteShellCommandTool::new()
            .invoke(
                serde_json::json!({"command": "cat does-not-exist.txt"}),
                &context(&temp),
            )
            .await
            .unwrap();

        match outcome {
            ToolOutcome::Success(output) => {
                assert!(!output.contains("Exit code: 0"));
                assert!(output.contains("--- STDERR ---"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_blocked_command() {
        let temp = TempDir::new().unwrap();
        let outcome = ExecuteShellCommandTool::new()
            .invoke(
                serde_json::json!({"command": "rm -rf important"}),
                &context(&temp),
            )
            .await
            .unwrap();

        match outcome {
            ToolOutcome::Failure(message) => assert!(message.contains("not in the allowlist")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(temp.path().exists());
    }

    #[tokio::test]
    async fn test_execute_respects_context_extras() {
        let temp = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf())
            .with_extra_allowed_commands(vec!["true".to_string()]);

        let outcome = ExecuteShellCommandTool::new()
            .invoke(serde_json::json!({"command": "true"}), &ctx)
            .await
            .unwrap();

        assert!(matches!(outcome, ToolOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_execute_missing_command_argument() {
        let temp = TempDir::new().unwrap();
        let outcome = ExecuteShellCommandTool::new()
            .invoke(serde_json::json!({}), &context(&temp))
            .await
            .unwrap();

        assert!(matches!(outcome, ToolOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let temp = TempDir::new().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf())
            .with_extra_allowed_commands(vec!["sleep".to_string()]);

        let outcome = ExecuteShellCommandTool::new()
            .invoke(
                serde_json::json!({"command": "sleep 5", "timeout": 1}),
                &ctx,
            )
            .await
            .unwrap();

        match outcome {
            ToolOutcome::Failure(message) => assert!(message.contains("timed out")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_long_output() {
        let long = "y".repeat(50);
        let truncated = truncate(&long, 10);
        assert!(truncated.contains("output truncated"));
        assert!(truncated.starts_with("yyyyyyyyyy"));
    }
}
