// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::PathBuf;
use std::sync::Arc;

use otto::chat::{ChatEngine, StdoutObserver};
use otto::cli::ChatArgs;
use otto::config::Settings;
use otto::error::{OttoError, Result};
use otto::history::{HistoryStore, SessionInfo};
use otto::llm::factory::ProviderFactory;
use otto::llm::rotation::RotationPolicy;
use otto::memory::SqliteMemory;
use otto::personas::resolve_persona;
use otto::tools::{TerminalPrompt, ToolContext, ToolDispatcher, ToolRegistry};
use otto::utils;

/// Everything the interactive chat loop needs, assembled in one place
pub(super) struct ChatRuntimeSetup {
    pub(super) engine: ChatEngine,
    pub(super) history_store: HistoryStore,
    pub(super) session_info: SessionInfo,
    pub(super) model: String,
    pub(super) persona_name: String,
    pub(super) working_directory: PathBuf,
}

/// Fail fast with an actionable message when no credential is available
pub(super) fn check_provider_configuration(settings: &Settings) -> Result<()> {
    if ProviderFactory::is_configured(settings) {
        return Ok(());
    }
    let env = &settings.provider.api_key_env;
    Err(OttoError::Config(format!(
        "No API key configured. Set {} (add {}_2, {}_3, ... for credential \
         rotation) or put provider.api_key in {}.",
        env,
        env,
        env,
        Settings::default_path().display()
    )))
}

/// Build the tool dispatcher shared by chat and agent modes
pub(super) fn build_dispatcher(settings: &Settings, working_directory: PathBuf) -> ToolDispatcher {
    let mut context = ToolContext::new(working_directory)
        .with_search_api_key(settings.tools.search_api_key())
        .with_extra_allowed_commands(settings.tools.allowed_commands.clone());
    if let Some(path) = &settings.tools.database_path {
        context = context.with_database_path(path.clone());
    }

    ToolDispatcher::new(
        ToolRegistry::with_builtins(),
        context,
        Arc::new(TerminalPrompt),
    )
}

/// Assemble the chat engine, history store, and session bookkeeping.
pub(super) fn initialize_chat_runtime(
    args: &ChatArgs,
    settings: Settings,
    verbose: u8,
) -> Result<ChatRuntimeSetup> {
    check_provider_configuration(&settings)?;

    let pool = ProviderFactory::credential_pool(&settings)?;
    let provider = ProviderFactory::create(&settings, &pool);
    if verbose > 0 {
        eprintln!("[verbose] Credential pool size: {}", pool.len());
    }

    let model = args
        .model
        .clone()
        .unwrap_or_else(|| settings.provider.default_model.clone());
    // Falling back to the model we already failed on would loop
    let fallback =
        Some(settings.provider.fallback_model.clone()).filter(|fallback| fallback != &model);

    let persona = resolve_persona(args.persona.as_deref(), &Settings::personas_dir())?;
    let working_directory = std::env::current_dir()?;

    let mut system_instruction = persona.instruction.clone();
    let listing = utils::directory_context(&working_directory);
    if !listing.is_empty() {
        system_instruction.push_str("\n\nWorking directory layout:\n");
        system_instruction.push_str(&listing);
    }

    let dispatcher = build_dispatcher(&settings, working_directory.clone());

    let mut engine = ChatEngine::new(provider, pool, dispatcher, model.clone())
        .with_policy(RotationPolicy::from(&settings.resilience))
        .with_fallback_model(fallback)
        .with_system_instruction(system_instruction)
        .with_observer(Arc::new(StdoutObserver))
        .with_streaming(!args.no_stream && settings.defaults.stream)
        .with_generation(settings.defaults.max_tokens, settings.defaults.temperature);

    // Memory is best-effort: a broken store never blocks the session
    if settings.memory.enabled {
        match SqliteMemory::open(Settings::memory_db_path()) {
            Ok(memory) => {
                let memory = memory.with_thresholds(
                    settings.memory.min_intent_chars,
                    settings.memory.min_response_chars,
                );
                engine = engine.with_memory(Arc::new(memory));
            }
            Err(e) => {
                tracing::warn!(
                    target: "otto.memory",
                    error = %e,
                    "long-term memory unavailable, continuing without it"
                );
            }
        }
    }

    let history_store = HistoryStore::open()?;
    let session_info = SessionInfo::new(
        uuid::Uuid::new_v4(),
        working_directory.clone(),
        model.clone(),
    );

    if verbose > 0 {
        eprintln!("[verbose] Session: {}", session_info.id);
        eprintln!("[verbose] Persona: {}", persona.name);
    }

    Ok(ChatRuntimeSetup {
        engine,
        history_store,
        session_info,
        model,
        persona_name: persona.name,
        working_directory,
    })
}
