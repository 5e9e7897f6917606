// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Autonomous agent mode
//!
//! One classification call routes a goal onto a ReAct loop or a plan
//! executor; both share a step loop, a strict JSON step protocol, and a
//! scratchpad that survives credential rotations.

pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod types;

pub use orchestrator::{AgentOrchestrator, DEFAULT_EXECUTOR_STEPS, DEFAULT_REACT_STEPS};
pub use types::{
    AgentAction, AgentOutcome, AgentProgressEvent, AgentStep, Classification, PlannedFile,
    ProgressSender, ProjectPlan, Scratchpad, ScratchpadEntry, StopReason, TaskKind,
};
