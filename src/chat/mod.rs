// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat layer: stream accumulation and the tool-calling turn engine

pub mod engine;
pub mod streaming;

pub use engine::{ChatEngine, SilentObserver, StdoutObserver, TextObserver, TurnOutcome};
pub use streaming::{drain_stream, StreamAccumulator, StreamEventResult, StreamedResponse};
