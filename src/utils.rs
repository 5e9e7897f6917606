// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Utility functions for Otto
//!
//! This module contains pure functions extracted from main.rs for testability.

use crate::error::OttoError;
use std::path::Path;

/// Entry cap for the directory listing embedded in the chat system prompt
const DIR_CONTEXT_MAX_ENTRIES: usize = 100;

/// Depth cap for the same listing
const DIR_CONTEXT_MAX_DEPTH: usize = 3;

/// Build a bounded listing of the working directory for the system prompt.
///
/// Entries are relative paths, directories marked with a trailing slash,
/// dot-entries skipped. The listing stops at the entry cap with a marker so
/// a huge tree never swamps the context window.
pub fn directory_context(dir: &Path) -> String {
    let mut lines = Vec::new();
    let mut truncated = false;

    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(DIR_CONTEXT_MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker.filter_map(|e| e.ok()) {
        if lines.len() >= DIR_CONTEXT_MAX_ENTRIES {
            truncated = true;
            break;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        if entry.file_type().is_dir() {
            lines.push(format!("{}/", relative));
        } else {
            lines.push(relative);
        }
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut listing = lines.join("\n");
    if truncated {
        listing.push_str("\n... (listing truncated)");
    }
    listing
}

/// Extract shell commands from fenced code blocks in a model reply.
///
/// Matches ```bash, ```shell and ```sh fences; lines inside a block are
/// split into individual commands, skipping blanks and `#` comments.
pub fn extract_suggested_commands(text: &str) -> Vec<String> {
    let fence = regex::RegexBuilder::new(r"```(?:bash|shell|sh)\n(.*?)\n```")
        .dot_matches_new_line(true)
        .build()
        .expect("static pattern");

    let mut commands = Vec::new();
    for captures in fence.captures_iter(text) {
        if let Some(block) = captures.get(1) {
            for line in block.as_str().lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                commands.push(trimmed.to_string());
            }
        }
    }
    commands
}

/// Format an error for display to the user
pub fn format_error(error: &OttoError) -> String {
    match error {
        OttoError::Api(api_error) => match api_error {
            crate::error::ApiError::QuotaExhausted(detail) => {
                let mut msg = format!("API Error: quota exhausted: {}\n", detail);
                msg.push_str(
                    "Add more credentials (GEMINI_API_KEY_2, GEMINI_API_KEY_3, ...) \
                     or wait for the quota window to reset.",
                );
                msg
            }
            _ => format!("API Error: {}", api_error),
        },
        _ => format!("Error: {}", error),
    }
}

/// Parse a session ID argument, supporting both short and full UUID forms
///
/// Returns the normalized session ID string or an error if invalid.
pub fn parse_session_id(session_id: &str) -> Result<String, OttoError> {
    if session_id.is_empty() {
        return Err(OttoError::InvalidInput(
            "Session ID cannot be empty".to_string(),
        ));
    }

    // Short form is allowed (will be matched against existing sessions)
    if session_id.len() <= 8 {
        // Validate it's a valid hex prefix
        if session_id.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(session_id.to_string());
        }
        return Err(OttoError::InvalidInput(
            "Invalid session ID: must be hexadecimal".to_string(),
        ));
    }

    // Full form - validate as UUID
    uuid::Uuid::parse_str(session_id)
        .map(|u| u.to_string())
        .map_err(|_| OttoError::InvalidInput("Invalid session ID format".to_string()))
}

/// Check if a command is an exit command
pub fn is_exit_command(input: &str) -> bool {
    let trimmed = input.trim().to_lowercase();
    matches!(trimmed.as_str(), "exit" | "quit" | "/exit" | "/quit")
}

/// Parse a slash command into (command_name, arguments)
///
/// Returns None if the input is not a slash command.
pub fn parse_slash_command(input: &str) -> Option<(&str, &str)> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let without_slash = &trimmed[1..];
    match without_slash.find(char::is_whitespace) {
        Some(idx) => Some((&without_slash[..idx], without_slash[idx..].trim())),
        None => Some((without_slash, "")),
    }
}
