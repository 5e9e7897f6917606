// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Folds provider stream events into the complete response the turn engine
//! works with. The fold is separated from I/O so it can be tested without a
//! live stream.

use futures::StreamExt;

use crate::error::Result;
use crate::llm::provider::{
    CompletionResponse, EventStream, FinishReason, StreamEvent, StreamPart, TokenUsage,
    ToolCallRequest,
};
use crate::llm::session::{Part, Turn};

/// Accumulator for one streamed model response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<FinishReason>,
    usage: TokenUsage,
}

/// What one stream event contributed
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventResult {
    /// Text to display immediately
    TextDelta(String),
    /// The model requested a tool, identified by name
    ToolCallRequested(String),
    /// The stream finished with this reason
    Finished(FinishReason),
    /// Token usage arrived
    UsageReported(TokenUsage),
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Fold one event; returns what it contributed, in order.
    pub fn process_event(&mut self, event: StreamEvent) -> Vec<StreamEventResult> {
        let mut results = Vec::new();
        match event {
            StreamEvent::Chunk { parts } => {
                for part in parts {
                    match part {
                        StreamPart::Text(text) => {
                            self.text.push_str(&text);
                            results.push(StreamEventResult::TextDelta(text));
                        }
                        StreamPart::ToolCall { name, args } => {
                            results.push(StreamEventResult::ToolCallRequested(name.clone()));
                            self.tool_calls.push(ToolCallRequest { name, args });
                        }
                    }
                }
            }
            StreamEvent::Finish { reason } => {
                self.finish_reason = Some(reason.clone());
                results.push(StreamEventResult::Finished(reason));
            }
            StreamEvent::Usage { usage } => {
                self.usage = usage;
                results.push(StreamEventResult::UsageReported(usage));
            }
        }
        results
    }

    /// Consume the accumulator into the final response
    pub fn finish(self) -> StreamedResponse {
        StreamedResponse {
            text: self.text,
            tool_calls: self.tool_calls,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

/// A fully consumed model response
#[derive(Debug, Clone)]
pub struct StreamedResponse {
    /// Concatenated text parts
    pub text: String,
    /// Tool calls in request order
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<FinishReason>,
    pub usage: TokenUsage,
}

impl StreamedResponse {
    /// Rebuild the model turn for the session transcript
    pub fn to_model_turn(&self) -> Turn {
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(Part::text(self.text.clone()));
        }
        for call in &self.tool_calls {
            parts.push(Part::tool_call(call.name.clone(), call.args.clone()));
        }
        Turn::model_parts(parts)
    }
}

impl From<CompletionResponse> for StreamedResponse {
    fn from(response: CompletionResponse) -> Self {
        let text = response.text();
        let tool_calls = response.tool_calls();
        Self {
            text,
            tool_calls,
            finish_reason: response.finish_reason,
            usage: response.usage,
        }
    }
}

/// Consume a provider stream to completion, reporting text deltas as they
/// arrive. A mid-stream error aborts the fold and propagates, so a rate
/// limit inside the stream is retried like one at the request boundary.
pub async fn drain_stream<F>(mut stream: EventStream, mut on_text: F) -> Result<StreamedResponse>
where
    F: FnMut(&str),
{
    let mut accumulator = StreamAccumulator::new();
    while let Some(event) = stream.next().await {
        for result in accumulator.process_event(event?) {
            if let StreamEventResult::TextDelta(delta) = result {
                on_text(&delta);
            }
        }
    }
    Ok(accumulator.finish())
}

/// Builder for simulating stream events in tests
#[cfg(test)]
pub struct StreamEventBuilder;

#[cfg(test)]
impl StreamEventBuilder {
    pub fn text(text: &str) -> StreamEvent {
        StreamEvent::Chunk {
            parts: vec![StreamPart::Text(text.to_string())],
        }
    }

    pub fn tool_call(name: &str, args: serde_json::Value) -> StreamEvent {
        StreamEvent::Chunk {
            parts: vec![StreamPart::ToolCall {
                name: name.to_string(),
                args,
            }],
        }
    }

    pub fn finish() -> StreamEvent {
        StreamEvent::Finish {
            reason: FinishReason::Stop,
        }
    }

    pub fn usage(prompt: u32, response: u32) -> StreamEvent {
        StreamEvent::Usage {
            usage: TokenUsage {
                prompt_tokens: prompt,
                response_tokens: response,
                total_tokens: prompt + response,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_concatenates_text() {
        let mut acc = StreamAccumulator::new();
        acc.process_event(StreamEventBuilder::text("Hello "));
        acc.process_event(StreamEventBuilder::text("world"));

        assert_eq!(acc.text(), "Hello world");
        let response = acc.finish();
        assert_eq!(response.text, "Hello world");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_accumulator_orders_tool_calls() {
        let mut acc = StreamAccumulator::new();
        acc.process_event(StreamEventBuilder::tool_call("a", serde_json::json!({"n": 1})));
        acc.process_event(StreamEventBuilder::tool_call("b", serde_json::json!({"n": 2})));
        acc.process_event(StreamEventBuilder::tool_call("c", serde_json::json!({"n": 3})));

        let response = acc.finish();
        let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_accumulator_mixed_chunk() {
        let mut acc = StreamAccumulator::new();
        let results = acc.process_event(StreamEvent::Chunk {
            parts: vec![
                StreamPart::Text("Checking.".to_string()),
                StreamPart::ToolCall {
                    name: "read_file".to_string(),
                    args: serde_json::json!({"path": "a.txt"}),
                },
            ],
        });

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0],
            StreamEventResult::TextDelta("Checking.".to_string())
        );
        assert_eq!(
            results[1],
            StreamEventResult::ToolCallRequested("read_file".to_string())
        );
        assert!(acc.has_tool_calls());
    }

    #[test]
    fn test_accumulator_captures_finish_and_usage() {
        let mut acc = StreamAccumulator::new();
        acc.process_event(StreamEventBuilder::text("done"));
        acc.process_event(StreamEventBuilder::finish());
        acc.process_event(StreamEventBuilder::usage(10, 4));

        let response = acc.finish();
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.total(), 14);
    }

    #[test]
    fn test_streamed_response_to_model_turn() {
        let mut acc = StreamAccumulator::new();
        acc.process_event(StreamEventBuilder::text("Let me check"));
        acc.process_event(StreamEventBuilder::tool_call(
            "list_directory",
            serde_json::json!({}),
        ));

        let turn = acc.finish().to_model_turn();
        assert_eq!(turn.parts.len(), 2);
        assert!(matches!(turn.parts[0], Part::Text { .. }));
        assert!(matches!(turn.parts[1], Part::ToolCall { .. }));
    }

    #[test]
    fn test_streamed_response_from_completion() {
        let response = CompletionResponse {
            model: "m".to_string(),
            parts: vec![
                Part::text("answer"),
                Part::tool_call("web_search", serde_json::json!({"query": "x"})),
            ],
            finish_reason: Some(FinishReason::Stop),
            usage: TokenUsage {
                prompt_tokens: 5,
                response_tokens: 3,
                total_tokens: 8,
            },
        };

        let streamed = StreamedResponse::from(response);
        assert_eq!(streamed.text, "answer");
        assert_eq!(streamed.tool_calls.len(), 1);
        assert_eq!(streamed.usage.total(), 8);
    }

    #[tokio::test]
    async fn test_drain_stream_reports_deltas_in_order() {
        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEventBuilder::text("a")),
            Ok(StreamEventBuilder::text("b")),
            Ok(StreamEventBuilder::finish()),
            Ok(StreamEventBuilder::usage(2, 2)),
        ];
        let stream: EventStream = Box::pin(futures::stream::iter(events));

        let mut seen = Vec::new();
        let response = drain_stream(stream, |delta| seen.push(delta.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(response.text, "ab");
        assert_eq!(response.usage.total(), 4);
    }

    #[tokio::test]
    async fn test_drain_stream_propagates_mid_stream_error() {
        use crate::error::{ApiError, OttoError};

        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEventBuilder::text("partial")),
            Err(ApiError::RateLimited(9).into()),
        ];
        let stream: EventStream = Box::pin(futures::stream::iter(events));

        let err = drain_stream(stream, |_| {}).await.unwrap_err();
        assert!(matches!(err, OttoError::Api(ApiError::RateLimited(9))));
    }

    #[tokio::test]
    async fn test_drain_stream_empty() {
        let stream: EventStream = Box::pin(futures::stream::iter(Vec::<Result<StreamEvent>>::new()));
        let response = drain_stream(stream, |_| {}).await.unwrap();
        assert!(response.text.is_empty());
        assert!(response.tool_calls.is_empty());
        assert!(response.finish_reason.is_none());
    }
}
