// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini provider implementation
//!
//! Talks to the Generative Language API. Credentials are swappable at
//! runtime through [`LlmProvider::reconfigure`]; the HTTP client itself is
//! key-agnostic because the key travels in a per-request header.

use async_trait::async_trait;
use futures_util::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use crate::error::{ApiError, OttoError, Result};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, EventStream, FinishReason, LlmProvider, ModelInfo,
    StreamEvent, StreamPart, TokenUsage, ToolDefinition,
};
use crate::llm::session::{Part, Role, Turn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: RwLock<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a provider pointed at a custom endpoint (used by tests)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: RwLock::new(api_key.into()),
            base_url: base_url.into(),
        }
    }

    fn current_key(&self) -> String {
        match self.api_key.read() {
            Ok(key) => key.clone(),
            Err(poisoned) => {
                tracing::warn!("API key lock poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    /// Convert session turns to the wire `contents` array.
    ///
    /// The wire knows only `user` and `model` roles; injected system-role
    /// turns (memory recalls) are sent as user content so the model sees
    /// them in context order.
    fn convert_turns(turns: &[Turn]) -> Vec<serde_json::Value> {
        turns
            .iter()
            .filter(|t| !t.parts.is_empty())
            .map(|turn| {
                let role = match turn.role {
                    Role::Model => "model",
                    Role::User | Role::System => "user",
                };
                let parts: Vec<serde_json::Value> =
                    turn.parts.iter().map(Self::convert_part).collect();
                serde_json::json!({ "role": role, "parts": parts })
            })
            .collect()
    }

    fn convert_part(part: &Part) -> serde_json::Value {
        match part {
            Part::Text { text } => serde_json::json!({ "text": text }),
            Part::ToolCall { name, args } => serde_json::json!({
                "functionCall": { "name": name, "args": args }
            }),
            Part::ToolResult { name, result } => serde_json::json!({
                "functionResponse": { "name": name, "response": result }
            }),
        }
    }

    fn convert_tools(tools: &[ToolDefinition]) -> serde_json::Value {
        let declarations: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();
        serde_json::json!([{ "functionDeclarations": declarations }])
    }

    fn build_request_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "contents": Self::convert_turns(&request.turns),
            "generationConfig": {
                "maxOutputTokens": request.max_tokens,
                "temperature": request.temperature,
            },
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": system }]
            });
        }

        if !request.tools.is_empty() {
            body["tools"] = Self::convert_tools(&request.tools);
        }

        body
    }

    /// Map an HTTP error status and body to a typed API error.
    ///
    /// Rate-limit replies embed the suggested wait in prose
    /// ("Please retry in 26.4s"); a 429 without a parseable wait means the
    /// quota window will not clear soon and is treated as exhaustion.
    fn parse_error(status: u16, body: &str) -> ApiError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            429 => {
                if let Some(secs) = extract_retry_secs(&message) {
                    ApiError::RateLimited(secs)
                } else {
                    ApiError::QuotaExhausted(message)
                }
            }
            403 => ApiError::PermissionDenied(message),
            404 => ApiError::InvalidModel(message),
            400 => {
                let lowered = message.to_lowercase();
                if lowered.contains("model") && lowered.contains("not") {
                    ApiError::InvalidModel(message)
                } else {
                    ApiError::InvalidRequest(message)
                }
            }
            s if s >= 500 => ApiError::ServerError {
                status: s,
                message,
            },
            s => ApiError::ServerError {
                status: s,
                message,
            },
        }
    }

    fn map_finish_reason(reason: &str) -> FinishReason {
        match reason {
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::MaxTokens,
            "SAFETY" => FinishReason::Safety,
            other => FinishReason::Other(other.to_string()),
        }
    }

    /// Expand one wire chunk into stream events
    fn chunk_to_events(chunk: GenerateContentResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(candidate) = chunk.candidates.into_iter().next() {
            if let Some(content) = candidate.content {
                let parts: Vec<StreamPart> = content
                    .parts
                    .into_iter()
                    .filter_map(WirePart::into_stream_part)
                    .collect();
                if !parts.is_empty() {
                    events.push(StreamEvent::Chunk { parts });
                }
            }
            if let Some(reason) = candidate.finish_reason {
                events.push(StreamEvent::Finish {
                    reason: Self::map_finish_reason(&reason),
                });
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            events.push(StreamEvent::Usage {
                usage: usage.into(),
            });
        }

        events
    }
}

/// Pull the suggested wait out of a rate-limit message, rounding up
fn extract_retry_secs(message: &str) -> Option<u32> {
    let re = Regex::new(r"[Pp]lease retry in (\d+(?:\.\d+)?)s").ok()?;
    let captures = re.captures(message)?;
    let secs: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(secs.ceil() as u32)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "gemini-flash-latest".to_string(),
                display_name: "Gemini Flash (latest)".to_string(),
                context_window: 1_048_576,
                max_output_tokens: 8192,
                supports_tools: true,
            },
            ModelInfo {
                id: "gemini-pro-latest".to_string(),
                display_name: "Gemini Pro (latest)".to_string(),
                context_window: 2_097_152,
                max_output_tokens: 8192,
                supports_tools: true,
            },
        ]
    }

    fn supports_model(&self, model: &str) -> bool {
        self.available_models().iter().any(|m| m.id == model) || model.starts_with("gemini-")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_request_body(&request);

        tracing::debug!(
            target: "otto.llm.gemini",
            model = %request.model,
            turns = request.turns.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.current_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| OttoError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OttoError::Api(Self::parse_error(status.as_u16(), &body)));
        }

        let wire: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| OttoError::Api(ApiError::InvalidResponse(e.to_string())))?;

        let candidate = wire
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse("response had no candidates".to_string()))?;

        let parts = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(WirePart::into_part).collect())
            .unwrap_or_default();

        Ok(CompletionResponse {
            model: request.model,
            parts,
            finish_reason: candidate.finish_reason.as_deref().map(Self::map_finish_reason),
            usage: wire.usage_metadata.map(Into::into).unwrap_or_default(),
        })
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::build_request_body(&request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.current_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| OttoError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OttoError::Api(Self::parse_error(status.as_u16(), &body)));
        }

        let byte_stream = response.bytes_stream();

        // SSE frames arrive as `data: <json>` lines; each data payload is a
        // complete GenerateContentResponse chunk.
        let event_stream = async_stream::try_stream! {
            let mut buffer = String::new();

            for await chunk_result in byte_stream {
                let chunk = chunk_result
                    .map_err(|e| OttoError::Api(ApiError::StreamError(e.to_string())))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    let Some(payload) = line.strip_prefix("data: ") else {
                        continue;
                    };

                    match serde_json::from_str::<GenerateContentResponse>(payload) {
                        Ok(wire_chunk) => {
                            for event in GeminiProvider::chunk_to_events(wire_chunk) {
                                yield event;
                            }
                        }
                        Err(e) => {
                            tracing::trace!(
                                target: "otto.llm.gemini",
                                error = %e,
                                "skipping unparseable stream payload"
                            );
                        }
                    }
                }
            }
        };

        Ok(Box::pin(event_stream))
    }

    fn reconfigure(&self, api_key: &str) {
        match self.api_key.write() {
            Ok(mut key) => *key = api_key.to_string(),
            Err(poisoned) => {
                tracing::warn!("API key lock poisoned, recovering");
                *poisoned.into_inner() = api_key.to_string();
            }
        }
        tracing::debug!(target: "otto.llm.gemini", "provider reconfigured with new credential");
    }

    fn count_tokens(&self, text: &str, _model: &str) -> Result<u32> {
        // Rough estimate: ~4 characters per token
        Ok((text.len() / 4).max(1) as u32)
    }
}

// ===== Wire types =====

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

impl WirePart {
    fn into_part(self) -> Option<Part> {
        if let Some(call) = self.function_call {
            return Some(Part::ToolCall {
                name: call.name,
                args: normalize_args(call.args),
            });
        }
        self.text.map(|text| Part::Text { text })
    }

    fn into_stream_part(self) -> Option<StreamPart> {
        if let Some(call) = self.function_call {
            return Some(StreamPart::ToolCall {
                name: call.name,
                args: normalize_args(call.args),
            });
        }
        self.text.map(StreamPart::Text)
    }
}

/// The wire sometimes sends null for an argument-less call
fn normalize_args(args: serde_json::Value) -> serde_json::Value {
    if args.is_null() {
        serde_json::json!({})
    } else {
        args
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for TokenUsage {
    fn from(meta: UsageMetadata) -> Self {
        TokenUsage {
            prompt_tokens: meta.prompt_token_count,
            response_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_turns_roles() {
        let turns = vec![
            Turn::user("hello"),
            Turn::model("hi"),
            Turn::system("### Relevant Past Interactions\nrecall"),
        ];
        let contents = GeminiProvider::convert_turns(&turns);

        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        // Injected context goes over the wire as user content
        assert_eq!(contents[2]["role"], "user");
    }

    #[test]
    fn test_convert_part_tool_call() {
        let part = Part::tool_call("read_file", serde_json::json!({"path": "/tmp/x"}));
        let value = GeminiProvider::convert_part(&part);
        assert_eq!(value["functionCall"]["name"], "read_file");
        assert_eq!(value["functionCall"]["args"]["path"], "/tmp/x");
    }

    #[test]
    fn test_convert_part_tool_result() {
        let part = Part::tool_result("read_file", "contents here");
        let value = GeminiProvider::convert_part(&part);
        assert_eq!(value["functionResponse"]["name"], "read_file");
        assert_eq!(value["functionResponse"]["response"]["result"], "contents here");
    }

    #[test]
    fn test_build_request_body_with_system_and_tools() {
        let request = CompletionRequest::new("gemini-flash-latest", vec![Turn::user("hi")])
            .with_system("be brief")
            .with_tools(vec![ToolDefinition {
                name: "web_search".to_string(),
                description: "Search the web".to_string(),
                input_schema: crate::llm::provider::ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties: serde_json::json!({"query": {"type": "string"}}),
                    required: vec!["query".to_string()],
                },
            }]);

        let body = GeminiProvider::build_request_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "web_search"
        );
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_build_request_body_omits_empty_tools() {
        let request = CompletionRequest::new("gemini-flash-latest", vec![Turn::user("hi")]);
        let body = GeminiProvider::build_request_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_extract_retry_secs_rounds_up() {
        assert_eq!(
            extract_retry_secs("Resource exhausted. Please retry in 26.394146s."),
            Some(27)
        );
        assert_eq!(extract_retry_secs("Please retry in 5s"), Some(5));
        assert_eq!(extract_retry_secs("no hint here"), None);
    }

    #[test]
    fn test_parse_error_429_with_wait_is_rate_limited() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for quota metric. Please retry in 12.5s.","status":"RESOURCE_EXHAUSTED"}}"#;
        match GeminiProvider::parse_error(429, body) {
            ApiError::RateLimited(secs) => assert_eq!(secs, 13),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_429_without_wait_is_quota_exhausted() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for metric generate_requests_per_day.","status":"RESOURCE_EXHAUSTED"}}"#;
        match GeminiProvider::parse_error(429, body) {
            ApiError::QuotaExhausted(msg) => assert!(msg.contains("per_day")),
            other => panic!("expected QuotaExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_403_permission_denied() {
        let body = r#"{"error":{"code":403,"message":"API key lacks permission.","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error(403, body),
            ApiError::PermissionDenied(_)
        ));
    }

    #[test]
    fn test_parse_error_404_invalid_model() {
        let body = r#"{"error":{"code":404,"message":"models/gemini-nope is not found","status":"NOT_FOUND"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error(404, body),
            ApiError::InvalidModel(_)
        ));
    }

    #[test]
    fn test_parse_error_400_model_message_is_invalid_model() {
        let body = r#"{"error":{"code":400,"message":"Model gemini-nope is not supported","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error(400, body),
            ApiError::InvalidModel(_)
        ));
    }

    #[test]
    fn test_parse_error_400_other_is_invalid_request() {
        let body = r#"{"error":{"code":400,"message":"contents must not be empty","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            GeminiProvider::parse_error(400, body),
            ApiError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_parse_error_500_server_error() {
        assert!(matches!(
            GeminiProvider::parse_error(500, "oops"),
            ApiError::ServerError { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_error_unparseable_body_uses_raw_text() {
        match GeminiProvider::parse_error(403, "plain text denial") {
            ApiError::PermissionDenied(msg) => assert_eq!(msg, "plain text denial"),
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_map_finish_reason() {
        assert_eq!(
            GeminiProvider::map_finish_reason("STOP"),
            FinishReason::Stop
        );
        assert_eq!(
            GeminiProvider::map_finish_reason("MAX_TOKENS"),
            FinishReason::MaxTokens
        );
        assert_eq!(
            GeminiProvider::map_finish_reason("RECITATION"),
            FinishReason::Other("RECITATION".to_string())
        );
    }

    #[test]
    fn test_chunk_to_events_text_and_usage() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "Hello"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 10,
                    "candidatesTokenCount": 5,
                    "totalTokenCount": 15
                }
            }"#,
        )
        .unwrap();

        let events = GeminiProvider::chunk_to_events(chunk);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Chunk { parts } if parts.len() == 1));
        assert!(matches!(
            &events[1],
            StreamEvent::Finish {
                reason: FinishReason::Stop
            }
        ));
        assert!(matches!(
            &events[2],
            StreamEvent::Usage { usage } if usage.total() == 15
        ));
    }

    #[test]
    fn test_chunk_to_events_function_call() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [
                        {"functionCall": {"name": "web_search", "args": {"query": "rust"}}}
                    ]}
                }]
            }"#,
        )
        .unwrap();

        let events = GeminiProvider::chunk_to_events(chunk);
        assert_eq!(events.len(), 1);
        if let StreamEvent::Chunk { parts } = &events[0] {
            assert_eq!(
                parts[0],
                StreamPart::ToolCall {
                    name: "web_search".to_string(),
                    args: serde_json::json!({"query": "rust"}),
                }
            );
        } else {
            panic!("expected chunk event");
        }
    }

    #[test]
    fn test_wire_part_null_args_normalized() {
        let part: WirePart =
            serde_json::from_str(r#"{"functionCall": {"name": "list_directory", "args": null}}"#)
                .unwrap();
        match part.into_part() {
            Some(Part::ToolCall { args, .. }) => assert_eq!(args, serde_json::json!({})),
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_reconfigure_swaps_key() {
        let provider = GeminiProvider::new("first-key");
        assert_eq!(provider.current_key(), "first-key");
        provider.reconfigure("second-key");
        assert_eq!(provider.current_key(), "second-key");
    }

    #[test]
    fn test_available_models_context_windows() {
        let provider = GeminiProvider::new("k");
        let models = provider.available_models();
        let flash = models.iter().find(|m| m.id == "gemini-flash-latest").unwrap();
        let pro = models.iter().find(|m| m.id == "gemini-pro-latest").unwrap();
        assert_eq!(flash.context_window, 1_048_576);
        assert_eq!(pro.context_window, 2_097_152);
    }

    #[test]
    fn test_supports_model_prefix() {
        let provider = GeminiProvider::new("k");
        assert!(provider.supports_model("gemini-flash-latest"));
        assert!(provider.supports_model("gemini-2.0-flash"));
        assert!(!provider.supports_model("gpt-4"));
    }
}
