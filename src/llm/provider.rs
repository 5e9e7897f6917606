// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM Provider trait and related types
//!
//! Defines the abstraction layer over the remote model service.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::session::{Part, Turn};

/// Boxed stream of events from a streaming completion
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Main trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &str;

    /// List available models
    fn available_models(&self) -> Vec<ModelInfo>;

    /// Check if a specific model is supported
    fn supports_model(&self, model: &str) -> bool;

    /// Get model info by ID
    fn get_model_info(&self, model: &str) -> Option<ModelInfo> {
        self.available_models().into_iter().find(|m| m.id == model)
    }

    /// Non-streaming completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Streaming completion
    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream>;

    /// Swap the active API credential. Takes effect on the next request;
    /// in-flight calls keep the key they started with.
    fn reconfigure(&self, api_key: &str);

    /// Count tokens for a text (provider-specific tokenization)
    fn count_tokens(&self, text: &str, model: &str) -> Result<u32>;
}

/// Request for completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,

    /// Conversation turns
    pub turns: Vec<Turn>,

    /// System instruction
    pub system: Option<String>,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Tools available for the model to use
    pub tools: Vec<ToolDefinition>,
}

/// Response from a non-streaming completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Model used
    pub model: String,

    /// Response parts in order
    pub parts: Vec<Part>,

    /// Why the model stopped
    pub finish_reason: Option<FinishReason>,

    /// Token usage
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Concatenated text parts of the response
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

    /// Tool calls requested by the response, in order
    pub fn tool_calls(&self) -> Vec<ToolCallRequest> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall { name, args } => Some(ToolCallRequest {
                    name: name.clone(),
                    args: args.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub args: serde_json::Value,
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of message
    Stop,
    /// Hit max tokens
    MaxTokens,
    /// Blocked by safety filters
    Safety,
    /// Anything else the service reports
    Other(String),
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt (history plus system instruction)
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the response
    #[serde(default)]
    pub response_tokens: u32,
    /// Total as reported by the service
    #[serde(default)]
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used; falls back to the sum when the service did not
    /// report a total
    pub fn total(&self) -> u32 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.prompt_tokens + self.response_tokens
        }
    }
}

/// Events from a streaming response
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of response parts
    Chunk { parts: Vec<StreamPart> },

    /// The model stopped
    Finish { reason: FinishReason },

    /// Token usage, reported once near the end of the stream
    Usage { usage: TokenUsage },
}

/// One part within a streamed chunk
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    /// Text fragment
    Text(String),

    /// Complete tool call (the wire delivers these whole, not as deltas)
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
}

/// Tool definition for the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema)
    pub input_schema: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// Information about a model
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model identifier
    pub id: String,

    /// Human-readable name
    pub display_name: String,

    /// Maximum context window in tokens
    pub context_window: u32,

    /// Maximum output tokens
    pub max_output_tokens: u32,

    /// Whether the model supports tool use
    pub supports_tools: bool,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            turns,
            system: None,
            max_tokens: 8192,
            temperature: 0.7,
            tools: vec![],
        }
    }

    /// Set the system instruction
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}
