// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Resilient call wrapper
//!
//! Every outbound model call goes through [`call_with_rotation`]. Soft rate
//! limits are absorbed with bounded same-key retries; quota exhaustion
//! rotates the credential pool and signals the caller to rebuild its
//! session. The wrapper never silently retries across a credential change.

use crate::config::settings::ResilienceConfig;
use crate::error::{ApiError, OttoError, Result};
use crate::llm::credentials::CredentialPool;
use crate::llm::provider::LlmProvider;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Policy knobs for the resilient wrapper
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Same-key retries allowed for soft rate limits before escalating
    pub max_soft_retries: u32,
    /// Safety margin added to the provider-suggested wait, in seconds
    pub retry_margin_secs: u64,
    /// Backoff base when the provider gave no wait hint (base^attempt seconds)
    pub base_retry_delay_secs: u64,
    /// Add up to 400ms of random jitter to hint-less backoff sleeps
    pub jitter: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RotationPolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_soft_retries: config.max_soft_retries,
            retry_margin_secs: config.retry_margin_secs,
            base_retry_delay_secs: config.base_retry_delay_secs,
            jitter: config.jitter,
        }
    }
}

impl RotationPolicy {
    /// Sleep duration for a soft rate limit. `attempt` is 1-based.
    fn soft_delay(&self, suggested_secs: u32, attempt: u32) -> Duration {
        if suggested_secs > 0 {
            return Duration::from_secs(suggested_secs as u64 + self.retry_margin_secs);
        }

        let base = Duration::from_secs(self.base_retry_delay_secs.pow(attempt));
        if self.jitter {
            let jitter_ms = rand::rng().random_range(0..=400);
            base + Duration::from_millis(jitter_ms)
        } else {
            base
        }
    }
}

/// Run `operation` with soft-retry and credential-rotation handling.
///
/// Behavior:
/// - success returns immediately;
/// - `RateLimited` sleeps out the suggested wait (plus margin) and retries
///   the same credential, up to `max_soft_retries` times;
/// - `QuotaExhausted`, or a rate limit that outlived the retry budget,
///   rotates the pool and reconfigures `provider` with the new key. If the
///   rotation lands back on the key this call started with there is nothing
///   left to rotate to and the underlying error is surfaced. Otherwise the
///   call fails with [`OttoError::SessionInvalidated`] and the caller must
///   rebuild its session before retrying;
/// - every other error passes through untouched.
pub async fn call_with_rotation<T, F, Fut>(
    provider: &dyn LlmProvider,
    pool: &mut CredentialPool,
    policy: &RotationPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_index = pool.current_index();
    let mut soft_attempts: u32 = 0;

    loop {
        let escalation = match operation().await {
            Ok(value) => {
                if soft_attempts > 0 {
                    tracing::debug!(
                        target: "otto.llm.rotation",
                        operation = operation_name,
                        attempts = soft_attempts + 1,
                        "succeeded after rate-limit retries"
                    );
                }
                return Ok(value);
            }

            Err(OttoError::Api(ApiError::RateLimited(suggested_secs))) => {
                if soft_attempts < policy.max_soft_retries {
                    soft_attempts += 1;
                    let delay = policy.soft_delay(suggested_secs, soft_attempts);
                    tracing::warn!(
                        target: "otto.llm.rotation",
                        operation = operation_name,
                        attempt = soft_attempts,
                        max = policy.max_soft_retries,
                        wait_secs = delay.as_secs(),
                        "rate limited, retrying on the same credential"
                    );
                    sleep(delay).await;
                    continue;
                }
                // Retry budget spent; treat like quota exhaustion
                OttoError::Api(ApiError::RateLimited(suggested_secs))
            }

            Err(err @ OttoError::Api(ApiError::QuotaExhausted(_))) => err,

            // Everything else is not this wrapper's problem
            Err(err) => return Err(err),
        };

        let new_index = pool.rotate();
        provider.reconfigure(pool.current());

        if new_index == start_index {
            tracing::error!(
                target: "otto.llm.rotation",
                operation = operation_name,
                "no alternate credential available, giving up"
            );
            return Err(escalation);
        }

        tracing::info!(
            target: "otto.llm.rotation",
            operation = operation_name,
            slot = new_index,
            "credential rotated, session rebuild required"
        );
        return Err(OttoError::SessionInvalidated {
            key_index: new_index,
        });
    }
}
