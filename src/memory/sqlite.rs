// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! SQLite-backed interaction memory

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::{OttoError, Result};
use crate::tools::ToolCallRecord;

use super::MemoryStore;

/// Exchanges shorter than these are noise, not memories
pub const DEFAULT_MIN_INTENT_CHARS: usize = 15;
pub const DEFAULT_MIN_RESPONSE_CHARS: usize = 20;

/// Most recent hits formatted into the recall block
const SEARCH_LIMIT: usize = 5;

/// Responses are clipped to this many characters in recall output
const RESPONSE_PREVIEW_CHARS: usize = 240;

/// Interaction memory stored in a single SQLite table.
///
/// The connection sits behind a mutex so the store satisfies `Send + Sync`
/// for sharing across the engine and orchestrator.
pub struct SqliteMemory {
    conn: Mutex<Connection>,
    min_intent_chars: usize,
    min_response_chars: usize,
}

impl SqliteMemory {
    /// Open or create the memory database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| OttoError::Config(format!("Failed to open memory store: {}", e)))?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| OttoError::Config(format!("Failed to open memory store: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                user_intent TEXT NOT NULL,
                tool_log TEXT NOT NULL,
                final_text TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| OttoError::Config(format!("Failed to create memory schema: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_interactions_timestamp
             ON interactions(timestamp)",
            [],
        )
        .map_err(|e| OttoError::Config(format!("Failed to create memory index: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            min_intent_chars: DEFAULT_MIN_INTENT_CHARS,
            min_response_chars: DEFAULT_MIN_RESPONSE_CHARS,
        })
    }

    pub fn with_thresholds(mut self, min_intent_chars: usize, min_response_chars: usize) -> Self {
        self.min_intent_chars = min_intent_chars;
        self.min_response_chars = min_response_chars;
        self
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(target: "otto.memory", "memory connection lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    #[cfg(test)]
    fn count(&self) -> usize {
        self.lock_conn()
            .query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
            .unwrap_or(0)
    }
}

impl MemoryStore for SqliteMemory {
    fn store(&self, user_intent: &str, tool_calls: &[ToolCallRecord], final_text: &str) -> bool {
        let intent = user_intent.trim();
        let response = final_text.trim();
        if intent.chars().count() < self.min_intent_chars
            || response.chars().count() < self.min_response_chars
        {
            tracing::debug!(target: "otto.memory", "skipping trivial exchange");
            return false;
        }

        let tool_log = match serde_json::to_string(tool_calls) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(target: "otto.memory", error = %e, "failed to serialize tool log");
                return false;
            }
        };

        let result = self.lock_conn().execute(
            "INSERT INTO interactions (timestamp, user_intent, tool_log, final_text)
             VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now().to_rfc3339(), intent, tool_log, response],
        );

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(target: "otto.memory", error = %e, "failed to store interaction");
                false
            }
        }
    }

    fn search(&self, query: &str) -> String {
        let needle = query.trim();
        if needle.is_empty() {
            return String::new();
        }

        let pattern = format!("%{}%", needle);
        let conn = self.lock_conn();
        let mut stmt = match conn.prepare(
            "SELECT timestamp, user_intent, final_text FROM interactions
             WHERE user_intent LIKE ?1 OR final_text LIKE ?1
             ORDER BY timestamp DESC
             LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(e) => {
                tracing::warn!(target: "otto.memory", error = %e, "failed to prepare recall query");
                return String::new();
            }
        };

        let rows = stmt.query_map(params![pattern, SEARCH_LIMIT], |row| {
            let timestamp: String = row.get(0)?;
            let intent: String = row.get(1)?;
            let response: String = row.get(2)?;
            Ok((timestamp, intent, response))
        });

        let hits: Vec<(String, String, String)> = match rows {
            Ok(mapped) => mapped.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                tracing::warn!(target: "otto.memory", error = %e, "recall query failed");
                return String::new();
            }
        };

        if hits.is_empty() {
            return String::new();
        }

        let mut block = String::from("### Relevant Past Interactions\n");
        for (timestamp, intent, response) in &hits {
            block.push_str(&format!(
                "[{}] User asked: {}\n  Outcome: {}\n",
                format_timestamp(timestamp),
                intent,
                preview(response)
            ));
        }
        block
    }
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn preview(response: &str) -> String {
    let flat = response.replace('\n', " ");
    if flat.chars().count() <= RESPONSE_PREVIEW_CHARS {
        flat
    } else {
        let clipped: String = flat.chars().take(RESPONSE_PREVIEW_CHARS).collect();
        format!("{}...", clipped)
    }
}
