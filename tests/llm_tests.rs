// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use otto::llm::credentials::CredentialPool;
use otto::llm::provider::{CompletionRequest, TokenUsage, ToolDefinition, ToolInputSchema};
use otto::llm::session::{ConversationSession, Part, Role, Turn};

#[test]
fn test_turn_user_creation() {
    let turn = Turn::user("Hello, world");

    assert_eq!(turn.role, Role::User);
    assert_eq!(turn.text(), "Hello, world");
    assert!(!turn.has_tool_calls());
}

#[test]
fn test_turn_model_with_tool_calls() {
    let turn = Turn::model_parts(vec![
        Part::text("Let me check that file."),
        Part::tool_call("read_file", serde_json::json!({"path": "Cargo.toml"})),
    ]);

    assert_eq!(turn.role, Role::Model);
    assert!(turn.has_tool_calls());
    let calls = turn.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "read_file");
    assert_eq!(calls[0].1["path"], "Cargo.toml");
    // text() only joins the text parts
    assert_eq!(turn.text(), "Let me check that file.");
}

#[test]
fn test_turn_text_joins_multiple_parts() {
    let turn = Turn::model_parts(vec![Part::text("first"), Part::text("second")]);
    assert_eq!(turn.text(), "first\nsecond");
}

#[test]
fn test_role_display() {
    assert_eq!(Role::User.to_string(), "user");
    assert_eq!(Role::Model.to_string(), "model");
    assert_eq!(Role::System.to_string(), "system");
}

#[test]
fn test_session_accumulates_turns() {
    let mut session = ConversationSession::new("You are a helpful assistant.");
    assert!(session.is_empty());

    session.push(Turn::user("hi"));
    session.push(Turn::model("hello!"));

    assert_eq!(session.len(), 2);
    assert_eq!(session.last().unwrap().role, Role::Model);
    assert_eq!(session.last_model().unwrap().text(), "hello!");
}

#[test]
fn test_session_rebuild_drops_injected_system_turns() {
    let mut session = ConversationSession::new("instruction");
    session.push(Turn::user("question"));
    session.push(Turn::system("recalled memory context"));
    session.push(Turn::model("answer"));

    session.rebuild();

    assert_eq!(session.len(), 2);
    assert!(session.turns.iter().all(|t| t.role != Role::System));
    // The system instruction itself survives the rebuild
    assert_eq!(session.system_instruction, "instruction");
}

#[test]
fn test_turn_serializes_for_transcripts() {
    let turn = Turn::user("persist me");
    let json = serde_json::to_string(&turn).unwrap();

    let restored: Turn = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.id, turn.id);
    assert_eq!(restored.role, Role::User);
    assert_eq!(restored.text(), "persist me");
}

#[test]
fn test_completion_request_builders() {
    let request = CompletionRequest::new("gemini-flash-latest", vec![Turn::user("hi")])
        .with_system("be terse")
        .with_max_tokens(2048)
        .with_temperature(0.1)
        .with_tools(vec![ToolDefinition {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: serde_json::json!({}),
                required: vec![],
            },
        }]);

    assert_eq!(request.model, "gemini-flash-latest");
    assert_eq!(request.system.as_deref(), Some("be terse"));
    assert_eq!(request.max_tokens, 2048);
    assert_eq!(request.temperature, 0.1);
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, "read_file");
}

#[test]
fn test_token_usage_total_prefers_reported() {
    let usage = TokenUsage {
        prompt_tokens: 10,
        response_tokens: 5,
        total_tokens: 17,
    };
    assert_eq!(usage.total(), 17);
}

#[test]
fn test_token_usage_total_falls_back_to_sum() {
    let usage = TokenUsage {
        prompt_tokens: 10,
        response_tokens: 5,
        total_tokens: 0,
    };
    assert_eq!(usage.total(), 15);
}

#[test]
fn test_token_usage_deserializes_partial_payload() {
    // Providers omit fields they did not count
    let usage: TokenUsage = serde_json::from_str(r#"{"prompt_tokens": 3}"#).unwrap();
    assert_eq!(usage.prompt_tokens, 3);
    assert_eq!(usage.response_tokens, 0);
    assert_eq!(usage.total(), 3);
}

#[test]
fn test_credential_pool_rotation_wraps() {
    let mut pool = CredentialPool::new(vec![
        "key-a".to_string(),
        "key-b".to_string(),
        "key-c".to_string(),
    ])
    .unwrap();

    assert_eq!(pool.current(), "key-a");
    pool.rotate();
    pool.rotate();
    assert_eq!(pool.current(), "key-c");
    assert_eq!(pool.rotate(), 0);
    assert_eq!(pool.current(), "key-a");
}

#[test]
fn test_credential_pool_rejects_empty_list() {
    assert!(CredentialPool::new(vec![]).is_err());
}

#[test]
fn test_session_token_estimate_grows_with_content() {
    let mut session = ConversationSession::new("");
    let empty = session.estimate_tokens();

    session.push(Turn::user(
        "a much longer message with considerably more content in it",
    ));
    assert!(session.estimate_tokens() > empty);
}
