// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use uuid::Uuid;

use otto::chat::{ChatEngine, StdoutObserver};
use otto::cli::{AskArgs, HistoryArgs, HistoryCommands};
use otto::config::Settings;
use otto::error::{OttoError, Result};
use otto::history::HistoryStore;
use otto::llm::factory::ProviderFactory;
use otto::llm::rotation::RotationPolicy;
use otto::llm::{LlmProvider, Role};
use otto::tools::{TerminalPrompt, ToolContext, ToolDispatcher, ToolRegistry};
use otto::utils;

use super::chat_runtime::check_provider_configuration;

/// Run single question mode
pub(super) async fn run_ask(args: AskArgs, settings: Settings, verbose: u8) -> Result<()> {
    check_provider_configuration(&settings)?;

    let pool = ProviderFactory::credential_pool(&settings)?;
    let provider = ProviderFactory::create(&settings, &pool);
    let model = args
        .model
        .unwrap_or_else(|| settings.provider.default_model.clone());

    if verbose > 0 {
        eprintln!("[verbose] Ask mode, model: {}", model);
    }

    // Build prompt, optionally with piped context
    let mut prompt = args.prompt;
    if args.stdin {
        let mut piped = String::new();
        io::stdin().read_to_string(&mut piped)?;
        let piped = piped.trim();
        if !piped.is_empty() {
            prompt = format!("{}\n\n<stdin>\n{}\n</stdin>", prompt, piped);
        }
    }

    // No tools in ask mode: an empty registry keeps the request text-only
    // while still going through the rotation-aware call path.
    let dispatcher = ToolDispatcher::new(
        ToolRegistry::new(),
        ToolContext::new(std::env::current_dir()?),
        Arc::new(TerminalPrompt),
    );

    let mut engine = ChatEngine::new(provider, pool, dispatcher, model)
        .with_policy(RotationPolicy::from(&settings.resilience))
        .with_observer(Arc::new(StdoutObserver))
        .with_streaming(settings.defaults.stream)
        .with_generation(settings.defaults.max_tokens, settings.defaults.temperature);

    // The observer prints the response in both streaming and buffered mode
    let _ = engine.run_turn(&prompt).await?;

    // Always terminate with a newline
    println!();

    Ok(())
}

/// List the models the configured provider exposes
pub(super) async fn run_models(settings: Settings) -> Result<()> {
    check_provider_configuration(&settings)?;

    let pool = ProviderFactory::credential_pool(&settings)?;
    let provider = ProviderFactory::create(&settings, &pool);

    println!("\nAvailable models:\n");
    for model in provider.available_models() {
        let tools = if model.supports_tools {
            "tools"
        } else {
            "no tools"
        };
        println!("  {} - {}", model.id, model.display_name);
        println!(
            "      context: {} tokens, output: {} tokens, {}",
            model.context_window, model.max_output_tokens, tools
        );
    }

    println!("\nChat default:  {}", settings.provider.default_model);
    println!("Agent default: {}\n", settings.provider.agent_model);

    Ok(())
}

/// Resolve a session argument (short 8-char prefix or full UUID) to an ID
fn resolve_session_id(store: &HistoryStore, session_id: &str) -> Result<Uuid> {
    let normalized = utils::parse_session_id(session_id)?;

    if normalized.len() <= 8 {
        store
            .find_by_prefix(&normalized)
            .map(|s| s.id)
            .ok_or_else(|| {
                OttoError::InvalidInput(format!("No session found matching '{}'", session_id))
            })
    } else {
        Uuid::parse_str(&normalized)
            .map_err(|_| OttoError::InvalidInput("Invalid session ID format".to_string()))
    }
}

/// Run history subcommands
pub(super) fn run_history_command(args: HistoryArgs) -> Result<()> {
    let store = HistoryStore::open()?;

    match args.command {
        HistoryCommands::List { limit } => {
            let sessions = store.list_recent(limit);

            if sessions.is_empty() {
                println!("\nNo sessions in history.\n");
                return Ok(());
            }

            println!("\nRecent sessions:\n");
            for session in sessions {
                let id_short = &session.id.to_string()[..8];
                let date = session.last_active.format("%Y-%m-%d %H:%M");
                let dir = session
                    .working_directory
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("?");
                let summary = session.summary.as_deref().unwrap_or("(no summary)");

                println!("  {} | {} | {} | {}", id_short, date, dir, summary);
            }
            println!();
        }

        HistoryCommands::Show { session_id } => {
            let id = resolve_session_id(&store, &session_id)?;
            let session = store.get(id).ok_or_else(|| {
                OttoError::InvalidInput(format!("Session '{}' not found", session_id))
            })?;

            println!("\nSession: {}", session.id);
            println!(
                "Started: {}",
                session.started_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "Last active: {}",
                session.last_active.format("%Y-%m-%d %H:%M:%S")
            );
            println!("Directory: {}", session.working_directory.display());
            println!("Model: {}", session.model);
            println!("Messages: {}", session.message_count);
            if let Some(ref summary) = session.summary {
                println!("\nSummary: {}", summary);
            }
            println!();

            // Replay the text turns when the transcript file is still around
            if let Ok(transcript) = store.load_transcript(id) {
                for turn in &transcript.turns {
                    let text = turn.text();
                    if text.is_empty() {
                        continue;
                    }
                    match turn.role {
                        Role::User => println!("you: {}", text),
                        Role::Model => println!("otto: {}\n", text),
                        Role::System => {}
                    }
                }
            }
        }

        HistoryCommands::Delete { session_id } => {
            let mut store = HistoryStore::open()?;
            let id = resolve_session_id(&store, &session_id)?;

            if store.delete(id)? {
                println!("Session deleted.");
            } else {
                println!("Session not found.");
            }
        }

        HistoryCommands::Clear { force } => {
            if !force {
                println!("This will delete ALL session history.");
                println!("Run with --force to confirm.");
                return Ok(());
            }

            let mut store = HistoryStore::open()?;
            let removed = store.clear()?;
            println!("Cleared {} sessions from history.", removed);
        }
    }

    Ok(())
}

/// Print welcome message
pub(super) fn print_welcome(model: &str, persona: &str, session_id: &Uuid) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("otto v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Resilient LLM assistant for your terminal");
    println!("Model: {}", model);
    println!("Persona: {}", persona);
    println!("Session: {}", &session_id.to_string()[..8]);
    println!("Type /help for commands, >command for shell, exit to quit\n");
    Ok(())
}

/// Print help message
pub(super) fn print_help() -> Result<()> {
    println!("\nCommands:");
    println!("  /help      - Show this help message");
    println!("  /clear     - Clear the conversation, keep the session");
    println!("  /new       - Start a fresh session");
    println!("  /session   - Show current session info");
    println!("  exit       - Exit otto");
    println!("\nDirect shell commands:");
    println!("  >command   - Execute shell command directly (e.g., >ls -la, >git status)");
    println!("\nTools available:");
    println!("  read_file              - Read file contents");
    println!("  write_file             - Create or overwrite files (asks first)");
    println!("  list_directory         - List directory contents");
    println!("  create_directory       - Create directories");
    println!("  execute_shell_command  - Run shell commands");
    println!("  query_database         - Query the configured SQLite database");
    println!("  web_search             - Search the web");
    println!("\nTip: Press Ctrl+C to interrupt a running response without exiting.");
    println!();
    Ok(())
}

/// Read user input
pub(super) fn read_user_input() -> Result<String> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Print the response prefix with otto's name
pub(super) fn print_response_prefix() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\notto: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}
