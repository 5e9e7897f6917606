// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Extraction of structured agent steps from raw model text
//!
//! Models are told to reply with a single JSON object, ideally inside a
//! fenced ```json block, but they wrap it in prose often enough that
//! extraction is its own step: the fenced block is tried first, then the
//! first balanced bare `{...}` anywhere in the text. Failure is a typed
//! [`AgentParseError`] carrying the raw output; there is no best-effort
//! fallback.

use serde::de::DeserializeOwned;

use crate::error::AgentParseError;

use super::types::{AgentStep, Classification, ProjectPlan};

/// Locate the JSON object in model output.
pub fn extract_json_object(text: &str) -> Result<&str, AgentParseError> {
    if let Some(block) = fenced_block(text) {
        if let Some(object) = balanced_object(block) {
            return Ok(object);
        }
    }
    balanced_object(text).ok_or_else(|| AgentParseError::NoJsonFound {
        raw: text.to_string(),
    })
}

/// Parse a ReAct step out of model output.
pub fn parse_agent_step(text: &str) -> Result<AgentStep, AgentParseError> {
    let step: AgentStep = parse_payload(text)?;
    if step.thought.trim().is_empty() {
        return Err(AgentParseError::Malformed {
            detail: "missing or empty `thought`".to_string(),
            raw: text.to_string(),
        });
    }
    if step.action.tool_name.trim().is_empty() {
        return Err(AgentParseError::Malformed {
            detail: "missing or empty `action.tool_name`".to_string(),
            raw: text.to_string(),
        });
    }
    Ok(step)
}

/// Parse the classification payload out of model output.
pub fn parse_classification(text: &str) -> Result<Classification, AgentParseError> {
    parse_payload(text)
}

/// Parse a standalone project plan out of model output.
pub fn parse_project_plan(text: &str) -> Result<ProjectPlan, AgentParseError> {
    parse_payload(text)
}

fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, AgentParseError> {
    let candidate = extract_json_object(text)?;
    let repaired = escape_control_chars(candidate);
    serde_json::from_str(&repaired).map_err(|e| AgentParseError::Malformed {
        detail: e.to_string(),
        raw: text.to_string(),
    })
}

/// Content of the first ```json fence, if any
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// First balanced `{...}` in the text, honoring strings and escapes
fn balanced_object(text: &str) -> Option<&str> {
    let open = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..open + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Escape literal control characters inside string values.
///
/// Models regularly emit real newlines inside JSON strings, which strict
/// parsing rejects.
fn escape_control_chars(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                in_string = !in_string;
                out.push(c);
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
