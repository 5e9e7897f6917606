// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History management for Otto sessions
//!
//! Tracks session metadata and full transcripts so past conversations can
//! be listed, replayed and pruned.

pub mod store;

pub use store::{HistoryStore, SessionInfo, SessionTranscript};
