// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Long-term conversation memory
//!
//! Past exchanges are recalled into new conversations and completed turns are
//! persisted for later recall. Memory is strictly best-effort: a broken or
//! missing store never fails a turn, so both operations are infallible at the
//! trait boundary.

mod sqlite;

pub use sqlite::SqliteMemory;

use crate::tools::ToolCallRecord;

/// Persistent store of past interactions.
///
/// `store` reports whether the exchange was persisted; `search` returns a
/// ready-to-inject context block, empty when nothing relevant was found or
/// the store is unavailable.
pub trait MemoryStore: Send + Sync {
    fn store(&self, user_intent: &str, tool_calls: &[ToolCallRecord], final_text: &str) -> bool;

    fn search(&self, query: &str) -> String;
}
