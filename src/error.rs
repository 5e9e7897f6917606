// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Otto
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Otto operations
#[derive(Error, Debug)]
pub enum OttoError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The active credential was rotated out; the conversation session must
    /// be rebuilt before the call can be retried. Recoverable by callers
    /// that own a session.
    #[error("Session invalidated: credential rotated to slot {key_index}, rebuild the session and retry")]
    SessionInvalidated { key_index: usize },

    /// Agent step output could not be parsed
    #[error(transparent)]
    AgentParse(#[from] AgentParseError),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Agent orchestration errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persona-related errors
    #[error("Persona error: {0}")]
    Persona(String),

    /// SQLite errors from the memory store or the database tool
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Rate limited by the API; carries the provider-suggested wait.
    /// Zero means the provider gave no hint.
    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u32),

    /// The credential's quota is exhausted; retrying with the same key
    /// will not help
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The credential is not allowed to use the requested resource
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Requested model does not exist or is not served
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// The request itself was rejected as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,
}

/// Errors from extracting a structured agent step out of model text.
///
/// These always surface the raw model output so the operator can see what
/// the model actually said instead of a bare parse failure.
#[derive(Error, Debug)]
pub enum AgentParseError {
    /// No JSON object anywhere in the output
    #[error("No JSON object found in model output:\n{raw}")]
    NoJsonFound { raw: String },

    /// A JSON object was found but did not match the expected shape
    #[error("Malformed agent step ({detail}) in model output:\n{raw}")]
    Malformed { detail: String, raw: String },
}

/// Result type alias for Otto operations
pub type Result<T> = std::result::Result<T, OttoError>;

impl From<rusqlite::Error> for OttoError {
    fn from(err: rusqlite::Error) -> Self {
        OttoError::Database(err.to_string())
    }
}
