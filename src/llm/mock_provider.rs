// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted mock provider
//!
//! A deterministic [`LlmProvider`] for tests: outcomes are played back in
//! order (the last one repeats), requests and credential swaps are
//! recorded for assertions. Lives outside `#[cfg(test)]` so integration
//! tests can use it too.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, OttoError, Result};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, EventStream, FinishReason, LlmProvider, ModelInfo,
    StreamEvent, StreamPart, TokenUsage,
};
use crate::llm::session::Part;

/// A scripted response
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    /// Text the model "says"
    pub text: String,
    /// Tool calls the model requests, in order
    pub tool_calls: Vec<(String, serde_json::Value)>,
    /// Usage reported at the end of the stream
    pub usage: TokenUsage,
}

/// One scripted outcome: a response or a typed failure
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Response(MockResponse),
    RateLimited(u32),
    QuotaExhausted(String),
    PermissionDenied(String),
    InvalidModel(String),
}

impl MockOutcome {
    fn to_error(&self) -> Option<OttoError> {
        match self {
            MockOutcome::Response(_) => None,
            MockOutcome::RateLimited(secs) => Some(ApiError::RateLimited(*secs).into()),
            MockOutcome::QuotaExhausted(msg) => Some(ApiError::QuotaExhausted(msg.clone()).into()),
            MockOutcome::PermissionDenied(msg) => {
                Some(ApiError::PermissionDenied(msg.clone()).into())
            }
            MockOutcome::InvalidModel(msg) => Some(ApiError::InvalidModel(msg.clone()).into()),
        }
    }
}

/// Mock LLM provider with scripted outcomes
pub struct MockProvider {
    name: String,
    outcomes: Arc<Mutex<Vec<MockOutcome>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<CompletionRequest>>>,
    reconfigured_keys: Arc<Mutex<Vec<String>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(Vec::new())),
            reconfigured_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a plain text response
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_outcome(MockOutcome::Response(MockResponse {
            text: text.into(),
            ..Default::default()
        }))
    }

    /// Queue a response that requests a single tool call
    pub fn with_tool_call(
        self,
        text: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        self.with_outcome(MockOutcome::Response(MockResponse {
            text: text.into(),
            tool_calls: vec![(tool_name.into(), args)],
            ..Default::default()
        }))
    }

    /// Queue a full scripted response
    pub fn with_mock_response(self, response: MockResponse) -> Self {
        self.with_outcome(MockOutcome::Response(response))
    }

    /// Queue any outcome, including failures
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        lock_or_recover(&self.outcomes).push(outcome);
        self
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests seen so far
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        lock_or_recover(&self.recorded_requests).clone()
    }

    /// Keys passed to `reconfigure`, in order
    pub fn keys_seen(&self) -> Vec<String> {
        lock_or_recover(&self.reconfigured_keys).clone()
    }

    fn next_outcome(&self) -> MockOutcome {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        let outcomes = lock_or_recover(&self.outcomes);
        if outcomes.is_empty() {
            return MockOutcome::Response(MockResponse::default());
        }
        outcomes[index.min(outcomes.len() - 1)].clone()
    }

    fn record(&self, request: &CompletionRequest) {
        lock_or_recover(&self.recorded_requests).push(request.clone());
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("mock provider lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".to_string(),
            display_name: "Mock Model".to_string(),
            context_window: 1_000_000,
            max_output_tokens: 8192,
            supports_tools: true,
        }]
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.record(&request);
        let outcome = self.next_outcome();

        if let Some(err) = outcome.to_error() {
            return Err(err);
        }
        let MockOutcome::Response(response) = outcome else {
            unreachable!("non-response outcomes convert to errors");
        };

        let mut parts = Vec::new();
        if !response.text.is_empty() {
            parts.push(Part::text(response.text));
        }
        for (name, args) in response.tool_calls {
            parts.push(Part::tool_call(name, args));
        }

        Ok(CompletionResponse {
            model: request.model,
            parts,
            finish_reason: Some(FinishReason::Stop),
            usage: response.usage,
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        self.record(&request);
        let outcome = self.next_outcome();

        if let Some(err) = outcome.to_error() {
            return Err(err);
        }
        let MockOutcome::Response(response) = outcome else {
            unreachable!("non-response outcomes convert to errors");
        };

        let mut events: Vec<Result<StreamEvent>> = Vec::new();

        // Chunk the text the way a real stream would
        if !response.text.is_empty() {
            let chars: Vec<char> = response.text.chars().collect();
            for chunk in chars.chunks(10) {
                events.push(Ok(StreamEvent::Chunk {
                    parts: vec![StreamPart::Text(chunk.iter().collect())],
                }));
            }
        }

        for (name, args) in response.tool_calls {
            events.push(Ok(StreamEvent::Chunk {
                parts: vec![StreamPart::ToolCall { name, args }],
            }));
        }

        events.push(Ok(StreamEvent::Finish {
            reason: FinishReason::Stop,
        }));
        events.push(Ok(StreamEvent::Usage {
            usage: response.usage,
        }));

        Ok(Box::pin(stream::iter(events)))
    }

    fn reconfigure(&self, api_key: &str) {
        lock_or_recover(&self.reconfigured_keys).push(api_key.to_string());
    }

    fn count_tokens(&self, text: &str, _model: &str) -> Result<u32> {
        Ok((text.len() / 4).max(1) as u32)
    }
}
