// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Otto
//!
//! Handles loading and saving settings from ~/.otto/settings.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Main settings structure, stored in ~/.otto/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Default generation parameters for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Retry and credential-rotation settings for API calls
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Agent mode settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Long-term memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Tool execution settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key stored directly in the settings file. Takes precedence over
    /// the environment pool when set; rotation needs the numbered variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the primary API key. Additional keys
    /// for the rotation pool come from numbered suffixes of the same name
    /// (`GEMINI_API_KEY_2`, `GEMINI_API_KEY_3`, ...).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model for interactive chat
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model for agent runs
    #[serde(default = "default_agent_model")]
    pub agent_model: String,

    /// Model to fall back to when the primary is rejected
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Base URL override for custom endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Collect every configured API key, in rotation order.
    ///
    /// Reads `api_key_env`, then `{api_key_env}_2`, `{api_key_env}_3` and
    /// so on until the first unset variable. Blank values are skipped.
    pub fn credential_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();

        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.trim().is_empty() {
                keys.push(key);
            }
        }

        for n in 2.. {
            match std::env::var(format!("{}_{}", self.api_key_env, n)) {
                Ok(key) => {
                    if !key.trim().is_empty() {
                        keys.push(key);
                    }
                }
                Err(_) => break,
            }
        }

        keys
    }
}

/// Default generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Whether to stream responses by default
    #[serde(default = "default_true")]
    pub stream: bool,
}

/// Retry and credential-rotation configuration for API calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Same-key retries allowed for soft rate limits before rotating
    #[serde(default = "default_max_soft_retries")]
    pub max_soft_retries: u32,

    /// Safety margin added to provider-suggested waits, in seconds
    #[serde(default = "default_retry_margin_secs")]
    pub retry_margin_secs: u64,

    /// Backoff base when the provider gave no wait hint
    #[serde(default = "default_base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,

    /// Randomize hint-less backoff sleeps
    #[serde(default = "default_true")]
    pub jitter: bool,
}

/// Agent mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step ceiling for the ReAct path
    #[serde(default = "default_max_react_steps")]
    pub max_react_steps: usize,

    /// Step ceiling for the plan executor path
    #[serde(default = "default_max_executor_steps")]
    pub max_executor_steps: usize,
}

/// Long-term memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Record and recall past interactions
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum user-input length worth remembering
    #[serde(default = "default_min_intent_chars")]
    pub min_intent_chars: usize,

    /// Minimum response length worth remembering
    #[serde(default = "default_min_response_chars")]
    pub min_response_chars: usize,
}

/// Tool execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// SQLite database exposed to `query_database`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Environment variable holding the Brave Search API key
    #[serde(default = "default_search_api_key_env")]
    pub search_api_key_env: String,

    /// Extra commands allowed through the shell allowlist
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

impl ToolsConfig {
    /// Resolve the search API key from the configured environment variable.
    pub fn search_api_key(&self) -> Option<String> {
        std::env::var(&self.search_api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

// Default value functions
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_agent_model() -> String {
    "gemini-pro-latest".to_string()
}

fn default_fallback_model() -> String {
    "gemini-flash-latest".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_true() -> bool {
    true
}

fn default_max_soft_retries() -> u32 {
    3
}

fn default_retry_margin_secs() -> u64 {
    1
}

fn default_base_retry_delay_secs() -> u64 {
    2
}

fn default_max_react_steps() -> usize {
    10
}

fn default_max_executor_steps() -> usize {
    30
}

fn default_min_intent_chars() -> usize {
    15
}

fn default_min_response_chars() -> usize {
    20
}

fn default_search_api_key_env() -> String {
    "BRAVE_SEARCH_API_KEY".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            agent_model: default_agent_model(),
            fallback_model: default_fallback_model(),
            base_url: None,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            stream: true,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_soft_retries: default_max_soft_retries(),
            retry_margin_secs: default_retry_margin_secs(),
            base_retry_delay_secs: default_base_retry_delay_secs(),
            jitter: true,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_react_steps: default_max_react_steps(),
            max_executor_steps: default_max_executor_steps(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_intent_chars: default_min_intent_chars(),
            min_response_chars: default_min_response_chars(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            search_api_key_env: default_search_api_key_env(),
            allowed_commands: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the otto home directory (~/.otto or $OTTO_HOME).
    pub fn otto_home() -> PathBuf {
        if let Ok(home) = std::env::var("OTTO_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".otto")
    }

    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::otto_home().join("settings.json")
    }

    /// Get the personas directory.
    pub fn personas_dir() -> PathBuf {
        Self::otto_home().join("personas")
    }

    /// Get the history directory.
    pub fn history_dir() -> PathBuf {
        Self::otto_home().join("history")
    }

    /// Get the long-term memory database path.
    pub fn memory_db_path() -> PathBuf {
        Self::otto_home().join("memory.db")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save settings to a specific path, merging with existing file content
    /// to preserve unknown keys from other code versions or hand edits.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let new_value = serde_json::to_value(self)?;
        let merged = if path.exists() {
            let existing = std::fs::read_to_string(path)?;
            match serde_json::from_str::<serde_json::Value>(&existing) {
                Ok(existing_value) => deep_merge(existing_value, new_value),
                Err(_) => new_value, // Corrupt file, overwrite entirely.
            }
        } else {
            new_value
        };

        let content = serde_json::to_string_pretty(&merged)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories() -> Result<()> {
        for dir in [Self::otto_home(), Self::personas_dir(), Self::history_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is the serialized current
/// struct. Overlay values take priority.
fn deep_merge(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.provider.api_key_env, "GEMINI_API_KEY");
        assert_eq!(settings.provider.default_model, "gemini-flash-latest");
        assert_eq!(settings.provider.agent_model, "gemini-pro-latest");
        assert!(settings.memory.enabled);
    }

    #[test]
    fn test_defaults_config_default() {
        let config = DefaultsConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 8192);
        assert!(config.stream);
    }

    #[test]
    fn test_resilience_config_default() {
        let config = ResilienceConfig::default();
        assert_eq!(config.max_soft_retries, 3);
        assert_eq!(config.retry_margin_secs, 1);
        assert_eq!(config.base_retry_delay_secs, 2);
        assert!(config.jitter);
    }

    #[test]
    fn test_agent_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.max_react_steps, 10);
        assert_eq!(config.max_executor_steps, 30);
    }

    #[test]
    fn test_memory_config_default() {
        let config = MemoryConfig::default();
        assert_eq!(config.min_intent_chars, 15);
        assert_eq!(config.min_response_chars, 20);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.provider.default_model, "gemini-flash-latest");
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.provider.default_model = "gemini-exp".to_string();
        settings.agent.max_react_steps = 5;
        settings.tools.allowed_commands = vec!["terraform".to_string()];
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded.provider.default_model, "gemini-exp");
        assert_eq!(reloaded.agent.max_react_steps, 5);
        assert_eq!(reloaded.tools.allowed_commands, vec!["terraform".to_string()]);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{"provider": {"default_model": "gemini-exp"}}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.provider.default_model, "gemini-exp");
        // Everything unspecified falls back
        assert_eq!(settings.provider.api_key_env, "GEMINI_API_KEY");
        assert_eq!(settings.defaults.max_tokens, 8192);
        assert_eq!(settings.resilience.max_soft_retries, 3);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"hand_edited": {"keep": true}, "defaults": {"temperature": 0.2}}"#,
        )
        .unwrap();

        Settings::default().save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["hand_edited"]["keep"], true);
        // Struct values win over file values
        assert_eq!(raw["defaults"]["temperature"], 0.7);
    }

    #[test]
    fn test_credential_keys_collects_numbered_suffixes() {
        // Unique variable names keep parallel tests from interfering
        std::env::set_var("OTTO_TEST_POOL_KEY", "alpha");
        std::env::set_var("OTTO_TEST_POOL_KEY_2", "beta");
        std::env::set_var("OTTO_TEST_POOL_KEY_3", "gamma");

        let config = ProviderConfig {
            api_key_env: "OTTO_TEST_POOL_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.credential_keys(), vec!["alpha", "beta", "gamma"]);

        std::env::remove_var("OTTO_TEST_POOL_KEY");
        std::env::remove_var("OTTO_TEST_POOL_KEY_2");
        std::env::remove_var("OTTO_TEST_POOL_KEY_3");
    }

    #[test]
    fn test_credential_keys_stops_at_first_gap() {
        std::env::set_var("OTTO_TEST_GAP_KEY", "alpha");
        // No _2; _3 must not be reached
        std::env::set_var("OTTO_TEST_GAP_KEY_3", "orphan");

        let config = ProviderConfig {
            api_key_env: "OTTO_TEST_GAP_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.credential_keys(), vec!["alpha"]);

        std::env::remove_var("OTTO_TEST_GAP_KEY");
        std::env::remove_var("OTTO_TEST_GAP_KEY_3");
    }

    #[test]
    fn test_credential_keys_skips_blank_values() {
        std::env::set_var("OTTO_TEST_BLANK_KEY", "  ");
        std::env::set_var("OTTO_TEST_BLANK_KEY_2", "real");

        let config = ProviderConfig {
            api_key_env: "OTTO_TEST_BLANK_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.credential_keys(), vec!["real"]);

        std::env::remove_var("OTTO_TEST_BLANK_KEY");
        std::env::remove_var("OTTO_TEST_BLANK_KEY_2");
    }

    #[test]
    fn test_search_api_key_resolution() {
        std::env::set_var("OTTO_TEST_SEARCH_KEY", "brave-token");

        let config = ToolsConfig {
            search_api_key_env: "OTTO_TEST_SEARCH_KEY".to_string(),
            ..Default::default()
        };
        assert_eq!(config.search_api_key().as_deref(), Some("brave-token"));

        std::env::remove_var("OTTO_TEST_SEARCH_KEY");
        assert_eq!(config.search_api_key(), None);
    }

    #[test]
    fn test_unknown_keys_are_rejected_gracefully() {
        // serde default behavior: unknown fields are ignored
        let settings: Settings =
            serde_json::from_str(r#"{"future_section": {"x": 1}}"#).unwrap();
        assert_eq!(settings.defaults.temperature, 0.7);
    }
}
