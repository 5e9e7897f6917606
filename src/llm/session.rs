// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation session types
//!
//! Defines the turn and part structures exchanged with the LLM, and the
//! session container that owns the ordered history plus the system
//! instruction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a turn's author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operator input (also carries tool results back to the model)
    User,
    /// Model response
    Model,
    /// Injected context such as memory recalls; never sent verbatim,
    /// stripped on session rebuild
    System,
}

/// One part of a turn.
///
/// The wire format correlates tool results to tool calls by NAME within a
/// single reply, so parts carry no call ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text { text: String },

    /// Tool invocation requested by the model
    ToolCall {
        name: String,
        args: serde_json::Value,
    },

    /// Tool output fed back to the model
    ToolResult {
        name: String,
        result: serde_json::Value,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn tool_call(name: impl Into<String>, args: serde_json::Value) -> Self {
        Part::ToolCall {
            name: name.into(),
            args,
        }
    }

    /// Wrap a tool's string output in the object shape the wire expects
    pub fn tool_result(name: impl Into<String>, output: impl Into<String>) -> Self {
        Part::ToolResult {
            name: name.into(),
            result: serde_json::json!({ "result": output.into() }),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier for the turn
    pub id: Uuid,

    /// Who authored the turn
    pub role: Role,

    /// Ordered parts of the turn
    pub parts: Vec<Part>,

    /// When the turn was created
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            parts,
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn with plain text
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(content)])
    }

    /// Create a model turn with plain text
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(content)])
    }

    /// Create a model turn from parsed response parts
    pub fn model_parts(parts: Vec<Part>) -> Self {
        Self::new(Role::Model, parts)
    }

    /// Create the user turn carrying a batch of tool results
    pub fn tool_results(parts: Vec<Part>) -> Self {
        Self::new(Role::User, parts)
    }

    /// Create an injected-context turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(content)])
    }

    /// Concatenated text parts of the turn
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All tool-call parts in request order
    pub fn tool_calls(&self) -> Vec<(&str, &serde_json::Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall { name, args } => Some((name.as_str(), args)),
                _ => None,
            })
            .collect()
    }

    /// Check if the turn requests any tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::ToolCall { .. }))
    }

    /// Estimate token count for this turn.
    /// Simple heuristic of ~4 characters per token plus structural overhead.
    pub fn estimate_tokens(&self) -> u32 {
        let content_len: usize = self
            .parts
            .iter()
            .map(|p| match p {
                Part::Text { text } => text.len(),
                Part::ToolCall { name, args } => name.len() + args.to_string().len(),
                Part::ToolResult { name, result } => name.len() + result.to_string().len(),
            })
            .sum();

        ((content_len + 20) / 4) as u32
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A conversation session: system instruction plus ordered history.
///
/// Invariant: a turn containing tool-result parts immediately follows the
/// model turn whose parts requested them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSession {
    /// System instruction sent alongside every request
    pub system_instruction: String,

    /// All turns in order
    pub turns: Vec<Turn>,
}

impl ConversationSession {
    /// Create an empty session with a system instruction
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            turns: Vec::new(),
        }
    }

    /// Add a turn to the history
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Get the last model turn
    pub fn last_model(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Model)
    }

    /// Check if the session has no turns
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Get turn count
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Rebuild the session after a credential or model change: the system
    /// instruction survives, injected system-role turns do not.
    pub fn rebuild(&mut self) {
        self.turns.retain(|t| t.role != Role::System);
    }

    /// Estimate the total token count for the session
    pub fn estimate_tokens(&self) -> u32 {
        let system_tokens = (self.system_instruction.len() / 4) as u32;
        let turn_tokens: u32 = self.turns.iter().map(|t| t.estimate_tokens()).sum();
        system_tokens + turn_tokens
    }
}
