// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation turn engine
//!
//! Drives one user turn to completion: request a model response through the
//! rotation wrapper, dispatch any requested tools, feed the results back,
//! and repeat until the model answers in plain text.
//!
//! Credential rotation surfaces here as [`OttoError::SessionInvalidated`].
//! The engine rebuilds the session (dropping injected system-role turns) and
//! retries, at most once per credential in the pool. Model-access errors
//! trigger a single switch to the configured fallback model.

use std::sync::Arc;

use crate::chat::streaming::{drain_stream, StreamedResponse};
use crate::error::{ApiError, OttoError, Result};
use crate::llm::credentials::CredentialPool;
use crate::llm::provider::{CompletionRequest, LlmProvider, TokenUsage};
use crate::llm::rotation::{call_with_rotation, RotationPolicy};
use crate::llm::session::{ConversationSession, Part, Turn};
use crate::memory::MemoryStore;
use crate::tools::{ToolCallRecord, ToolDispatcher};

/// Receives text deltas as they stream in
pub trait TextObserver: Send + Sync {
    fn on_text(&self, delta: &str);
}

/// Discards all output
pub struct SilentObserver;

impl TextObserver for SilentObserver {
    fn on_text(&self, _delta: &str) {}
}

/// Prints deltas straight to stdout
pub struct StdoutObserver;

impl TextObserver for StdoutObserver {
    fn on_text(&self, delta: &str) {
        use std::io::Write;
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    }
}

/// Result of one completed user turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Concatenated model text across the whole turn
    pub final_text: String,
    /// Token usage summed over every model call in the turn
    pub usage: TokenUsage,
    /// Context window of the model that answered, when known
    pub token_limit: Option<u32>,
    /// Audit log of every tool dispatch in the turn
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Tool-calling conversation engine
pub struct ChatEngine {
    provider: Arc<dyn LlmProvider>,
    pool: CredentialPool,
    policy: RotationPolicy,
    dispatcher: ToolDispatcher,
    session: ConversationSession,
    memory: Option<Arc<dyn MemoryStore>>,
    observer: Arc<dyn TextObserver>,
    model: String,
    fallback_model: Option<String>,
    on_fallback: bool,
    streaming: bool,
    max_output_tokens: u32,
    temperature: f32,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        pool: CredentialPool,
        dispatcher: ToolDispatcher,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            pool,
            policy: RotationPolicy::default(),
            dispatcher,
            session: ConversationSession::default(),
            memory: None,
            observer: Arc::new(SilentObserver),
            model: model.into(),
            fallback_model: None,
            on_fallback: false,
            streaming: true,
            max_output_tokens: 8192,
            temperature: 0.7,
        }
    }

    pub fn with_policy(mut self, policy: RotationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TextObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.session.system_instruction = instruction.into();
        self
    }

    pub fn with_generation(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ConversationSession {
        &mut self.session
    }

    pub fn set_session(&mut self, session: ConversationSession) {
        self.session = session;
    }

    /// Run one user turn to completion.
    pub async fn run_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        if let Some(memory) = &self.memory {
            let recalled = memory.search(user_input);
            if !recalled.is_empty() {
                // Injected as a system-role turn so rebuild() drops it
                self.session.push(Turn::system(recalled));
            }
        }
        self.session.push(Turn::user(user_input));

        let outcome = self.drive_to_completion().await?;

        if let Some(memory) = &self.memory {
            let stored = memory.store(user_input, &outcome.tool_calls, &outcome.final_text);
            tracing::debug!(target: "otto.chat.engine", stored, "memory store attempted");
        }

        Ok(outcome)
    }

    /// awaiting-model / executing-tools loop for the pending input.
    async fn drive_to_completion(&mut self) -> Result<TurnOutcome> {
        let mut final_text = String::new();
        let mut total_usage = TokenUsage::default();
        let mut rebuilds = 0usize;

        loop {
            let response = match self.request_model_response().await {
                Ok(response) => response,
                Err(OttoError::SessionInvalidated { key_index }) => {
                    rebuilds += 1;
                    if rebuilds >= self.pool.len() {
                        return Err(ApiError::QuotaExhausted(format!(
                            "All {} configured credentials are exhausted",
                            self.pool.len()
                        ))
                        .into());
                    }
                    tracing::warn!(
                        target: "otto.chat.engine",
                        slot = key_index,
                        rebuild = rebuilds,
                        "session invalidated, rebuilding and retrying"
                    );
                    self.session.rebuild();
                    continue;
                }
                Err(OttoError::Api(api_err)) if is_model_access_error(&api_err) => {
                    if self.on_fallback {
                        return Err(api_err.into());
                    }
                    let Some(fallback) = self.fallback_model.clone() else {
                        return Err(api_err.into());
                    };
                    tracing::warn!(
                        target: "otto.chat.engine",
                        from = %self.model,
                        to = %fallback,
                        "model unavailable, switching to fallback"
                    );
                    self.model = fallback;
                    self.on_fallback = true;
                    self.session.rebuild();
                    continue;
                }
                Err(e) => return Err(e),
            };

            total_usage = add_usage(total_usage, response.usage);

            let model_turn = response.to_model_turn();
            if !model_turn.parts.is_empty() {
                self.session.push(model_turn);
            }

            if !response.text.is_empty() {
                if !final_text.is_empty() {
                    final_text.push('\n');
                }
                final_text.push_str(&response.text);
            }

            if response.tool_calls.is_empty() {
                break;
            }

            // Sequential dispatch; results batched in request order so the
            // model can correlate them by name within this reply.
            let mut result_parts = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let observation = self.dispatcher.dispatch(&call.name, &call.args).await;
                result_parts.push(Part::tool_result(call.name.clone(), observation));
            }
            self.session.push(Turn::tool_results(result_parts));
        }

        Ok(TurnOutcome {
            final_text,
            usage: total_usage,
            token_limit: self
                .provider
                .get_model_info(&self.model)
                .map(|m| m.context_window),
            tool_calls: self.dispatcher.take_records(),
        })
    }

    /// One model call through the rotation wrapper, stream fully consumed.
    async fn request_model_response(&mut self) -> Result<StreamedResponse> {
        let mut request = CompletionRequest::new(self.model.clone(), self.session.turns.clone())
            .with_max_tokens(self.max_output_tokens)
            .with_temperature(self.temperature)
            .with_tools(self.dispatcher.definitions());
        if !self.session.system_instruction.is_empty() {
            request = request.with_system(self.session.system_instruction.clone());
        }

        let provider = self.provider.clone();
        let observer = self.observer.clone();
        let streaming = self.streaming;

        call_with_rotation(
            self.provider.as_ref(),
            &mut self.pool,
            &self.policy,
            "chat_turn",
            move || {
                let provider = provider.clone();
                let observer = observer.clone();
                let request = request.clone();
                async move {
                    if streaming {
                        let stream = provider.complete_stream(request).await?;
                        drain_stream(stream, |delta| observer.on_text(delta)).await
                    } else {
                        let response = provider.complete(request).await?;
                        let streamed = StreamedResponse::from(response);
                        if !streamed.text.is_empty() {
                            observer.on_text(&streamed.text);
                        }
                        Ok(streamed)
                    }
                }
            },
        )
        .await
    }
}

fn is_model_access_error(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::PermissionDenied(_) | ApiError::InvalidModel(_)
    )
}

fn add_usage(acc: TokenUsage, next: TokenUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: acc.prompt_tokens + next.prompt_tokens,
        response_tokens: acc.response_tokens + next.response_tokens,
        total_tokens: acc.total_tokens + next.total(),
    }
}
