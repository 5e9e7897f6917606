// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Core types for the autonomous agent
//!
//! The agent speaks a strict JSON protocol: every model reply is a single
//! step object naming a thought and the next tool action. These types are
//! the deserialized forms of that protocol, plus the bookkeeping structures
//! the orchestrator threads through a run.

use serde::{Deserialize, Serialize};

use crate::tools::ToolCallRecord;

/// Terminal sentinel: a step invoking this pseudo-tool ends the run,
/// with `tool_args.answer` carrying the final response
pub const FINISH_TOOL: &str = "finish";

/// Fallback answer when a finish step omits one
pub const DEFAULT_FINISH_ANSWER: &str = "The task has been completed.";

fn empty_args() -> serde_json::Value {
    serde_json::json!({})
}

/// The action half of an agent step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentAction {
    /// Name of the tool to invoke, or the finish sentinel
    pub tool_name: String,
    /// Arguments for the tool
    #[serde(default = "empty_args")]
    pub tool_args: serde_json::Value,
}

/// One reasoning step: what the agent thinks and what it does next
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStep {
    pub thought: String,
    pub action: AgentAction,
}

impl AgentStep {
    /// Tool name with any namespace prefix stripped
    /// (models sometimes emit `functions:finish` style names).
    pub fn tool_name(&self) -> &str {
        self.action
            .tool_name
            .rsplit(':')
            .next()
            .unwrap_or(&self.action.tool_name)
    }

    pub fn is_finish(&self) -> bool {
        self.tool_name() == FINISH_TOOL
    }

    /// The final answer carried by a finish step
    pub fn answer(&self) -> Option<&str> {
        self.action
            .tool_args
            .get("answer")
            .and_then(serde_json::Value::as_str)
    }
}

/// A file the planner intends to create
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedFile {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

/// Development plan produced once by the planning call; immutable afterwards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectPlan {
    /// Sanitized lowercase project folder name
    pub project_name: String,
    /// Why this architecture and stack
    #[serde(default)]
    pub reasoning: String,
    /// Nested folder/file layout
    #[serde(default)]
    pub structure: serde_json::Value,
    /// Every file to create, with purpose
    #[serde(default)]
    pub files: Vec<PlannedFile>,
}

/// Raw payload of the classification call, before interpretation
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub task_type: Option<String>,
    /// Present on the simple path: the first ReAct step, saving a round-trip
    #[serde(default)]
    pub first_step: Option<AgentStep>,
    /// Present on the project path
    #[serde(default)]
    pub plan: Option<ProjectPlan>,
}

/// Which execution path a goal was routed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskKind {
    Simple,
    Project,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Simple => write!(f, "simple task"),
            TaskKind::Project => write!(f, "project"),
        }
    }
}

/// One completed step in the run log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScratchpadEntry {
    pub thought: String,
    pub action: AgentAction,
    pub observation: String,
}

/// Monotonic log of completed steps.
///
/// Entries are only ever appended; the log survives session rebuilds so
/// progress is never lost to a credential rotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn record(&mut self, thought: String, action: AgentAction, observation: String) {
        self.entries.push(ScratchpadEntry {
            thought,
            action,
            observation,
        });
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the log for re-seeding a rebuilt session
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "Step {}:\n  Thought: {}\n  Action: {} {}\n  Observation: {}\n",
                i + 1,
                entry.thought,
                entry.action.tool_name,
                entry.action.tool_args,
                entry.observation
            ));
        }
        out
    }
}

/// Why an agent run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model called the finish tool
    Finished,
    /// The step ceiling was hit; this is a reported outcome, not an error
    StepLimitReached,
}

/// Final state of a completed agent run
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final answer from the finish step; None when the step limit was hit
    pub answer: Option<String>,
    pub stop_reason: StopReason,
    pub kind: TaskKind,
    pub steps_taken: usize,
    pub scratchpad: Scratchpad,
    /// Audit log of every tool dispatch across the run
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Progress event emitted during an agent run
#[derive(Debug, Clone)]
pub enum AgentProgressEvent {
    /// Goal classified onto an execution path
    Classified { kind: TaskKind },
    /// The planning call produced a project plan
    PlanReady {
        project_name: String,
        file_count: usize,
    },
    /// Starting a new loop step
    StepStarted { step: usize, ceiling: usize },
    /// The model's reasoning for the current step
    Thought(String),
    /// About to dispatch a tool
    ActionDispatched {
        tool_name: String,
        args: serde_json::Value,
    },
    /// Result fed back to the model
    Observation(String),
    /// Session was rebuilt after a credential rotation
    SessionRebuilt { rebuilds: usize },
    /// The finish sentinel arrived
    Finished { answer: String },
    /// Ceiling hit without a finish step
    StepLimitReached { ceiling: usize },
}

impl AgentProgressEvent {
    /// Short status line for display
    pub fn status_text(&self) -> String {
        match self {
            AgentProgressEvent::Classified { kind } => {
                format!("Goal classified as {}", kind)
            }
            AgentProgressEvent::PlanReady {
                project_name,
                file_count,
            } => {
                format!("Plan ready: {} ({} files)", project_name, file_count)
            }
            AgentProgressEvent::StepStarted { step, ceiling } => {
                format!("Step {}/{}", step, ceiling)
            }
            AgentProgressEvent::Thought(thought) => {
                let short = if thought.chars().count() > 80 {
                    let clipped: String = thought.chars().take(80).collect();
                    format!("{}...", clipped)
                } else {
                    thought.clone()
                };
                format!("Thinking: {}", short)
            }
            AgentProgressEvent::ActionDispatched { tool_name, .. } => {
                format!("-> {}", tool_name)
            }
            AgentProgressEvent::Observation(observation) => {
                let short = if observation.chars().count() > 80 {
                    let clipped: String = observation.chars().take(80).collect();
                    format!("{}...", clipped)
                } else {
                    observation.clone()
                };
                format!("Observed: {}", short)
            }
            AgentProgressEvent::SessionRebuilt { rebuilds } => {
                format!("Session rebuilt after credential rotation ({})", rebuilds)
            }
            AgentProgressEvent::Finished { .. } => "Task complete".to_string(),
            AgentProgressEvent::StepLimitReached { ceiling } => {
                format!("Step limit reached ({} steps)", ceiling)
            }
        }
    }
}

/// Type alias for the progress channel sender
pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<AgentProgressEvent>;
