// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider construction
//!
//! Builds the credential pool and the provider client from settings.

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::error::Result;
use crate::llm::credentials::CredentialPool;
use crate::llm::provider::LlmProvider;
use crate::llm::providers::GeminiProvider;

/// Factory for creating LLM provider instances
pub struct ProviderFactory;

impl ProviderFactory {
    /// Build the credential pool for the configured provider.
    ///
    /// A key stored in settings takes precedence; otherwise the pool is
    /// collected from the configured environment variable and its numbered
    /// siblings.
    pub fn credential_pool(settings: &Settings) -> Result<CredentialPool> {
        if let Some(key) = &settings.provider.api_key {
            if !key.trim().is_empty() {
                return CredentialPool::new(vec![key.clone()]);
            }
        }
        CredentialPool::from_env(&settings.provider.api_key_env)
    }

    /// Create the provider client pointed at the pool's current key
    pub fn create(settings: &Settings, pool: &CredentialPool) -> Arc<dyn LlmProvider> {
        let provider = match &settings.provider.base_url {
            Some(url) => GeminiProvider::with_base_url(pool.current(), url),
            None => GeminiProvider::new(pool.current()),
        };
        Arc::new(provider)
    }

    /// Check whether any credential is available without constructing
    pub fn is_configured(settings: &Settings) -> bool {
        Self::credential_pool(settings).is_ok()
    }
}
