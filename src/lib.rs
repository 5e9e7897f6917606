// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Otto - resilient LLM assistant for the terminal.
//!
//! This crate exposes the shared runtime used by the `otto` CLI
//! (`src/main.rs`).
//!
//! Architecture highlights:
//! - `llm`: provider abstraction, credential pool and the resilient call
//!   wrapper that rotates keys across quota errors
//! - `chat`: conversation turn engine interleaving model replies with
//!   sequential tool execution
//! - `agents`: two-tier autonomous orchestrator (ReAct / plan-execute)
//! - `tools`: built-in tool implementations and the dispatch/confirmation flow
//! - `memory`: long-term interaction store backing chat recall
//! - `personas`, `history`, `config`: session surface around the engines

pub mod agents;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod memory;
pub mod personas;
pub mod tools;
pub mod utils;

pub use error::{OttoError, Result};
