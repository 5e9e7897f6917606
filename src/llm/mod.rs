// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Otto
//!
//! Provider abstraction, the credential pool, and the resilient call
//! wrapper that ties them together.

pub mod credentials;
pub mod factory;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod rotation;
pub mod session;

pub use provider::*;
pub use session::*;
