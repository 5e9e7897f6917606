// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! API credential pool
//!
//! An ordered set of API keys with a cursor. The resilient call wrapper is
//! the only code that rotates the cursor; everything else just reads the
//! current key.

use crate::error::{OttoError, Result};

/// Ordered pool of API keys with a current-key cursor.
///
/// Invariant: `current < keys.len()` for any constructed pool.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    keys: Vec<String>,
    current: usize,
}

impl CredentialPool {
    /// Create a pool from an explicit key list
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(OttoError::Config(
                "Credential pool cannot be empty".to_string(),
            ));
        }
        Ok(Self { keys, current: 0 })
    }

    /// Build the pool from environment variables: `BASE`, then `BASE_2`,
    /// `BASE_3`, ... stopping at the first unset name.
    pub fn from_env(base: &str) -> Result<Self> {
        let mut keys = Vec::new();

        if let Ok(key) = std::env::var(base) {
            if !key.trim().is_empty() {
                keys.push(key);
            }
        }

        let mut index = 2;
        loop {
            let name = format!("{}_{}", base, index);
            match std::env::var(&name) {
                Ok(key) if !key.trim().is_empty() => {
                    keys.push(key);
                    index += 1;
                }
                _ => break,
            }
        }

        if keys.is_empty() {
            return Err(OttoError::Config(format!(
                "No API key found. Set {} (and optionally {}_2, {}_3, ...) in the environment.",
                base, base, base
            )));
        }

        tracing::debug!(
            target: "otto.llm.credentials",
            count = keys.len(),
            "loaded credential pool from environment"
        );

        Self::new(keys)
    }

    /// The key the cursor points at
    pub fn current(&self) -> &str {
        &self.keys[self.current]
    }

    /// Cursor position
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Number of keys in the pool
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Advance the cursor to the next key, wrapping around.
    /// Returns the new cursor position.
    pub fn rotate(&mut self) -> usize {
        self.current = (self.current + 1) % self.keys.len();
        tracing::info!(
            target: "otto.llm.credentials",
            slot = self.current,
            key = %masked(self.current()),
            "rotated to next credential"
        );
        self.current
    }
}

/// Shorten a key for log output, keeping only the last four characters
fn masked(key: &str) -> String {
    if key.len() <= 4 {
        "****".to_string()
    } else {
        format!("...{}", &key[key.len() - 4..])
    }
}
