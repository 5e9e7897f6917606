// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Otto - resilient LLM assistant for your terminal
//!
//! Entry point for the Otto CLI application.

use std::io::{self, Write};

use clap::Parser;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use uuid::Uuid;

use otto::cli::{ChatArgs, Cli, Commands};
use otto::config::Settings;
use otto::error::Result;
use otto::history::{SessionInfo, SessionTranscript};
use otto::llm::ConversationSession;
use otto::utils;

#[path = "main/agent_loop.rs"]
mod agent_loop;
#[path = "main/chat_runtime.rs"]
mod chat_runtime;
#[path = "main/chat_ui.rs"]
mod chat_ui;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use agent_loop::run_agent;
use chat_runtime::{initialize_chat_runtime, ChatRuntimeSetup};
#[cfg(test)]
use chat_runtime::{build_dispatcher, check_provider_configuration};
use chat_ui::{offer_suggested_commands, print_tool_calls, run_shell_passthrough, token_line};
#[cfg(test)]
use chat_ui::{
    is_error_result, print_shell_output, shell_content_lines, shell_exit_code, truncate_line,
    SHELL_OUTPUT_MAX_LINES,
};
use cli_commands::{
    print_help, print_response_prefix, print_welcome, read_user_input, run_ask,
    run_history_command, run_models,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // Practical debug toggle: `-v` enables runtime diagnostics without requiring
    // users to know target names up front. `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        for directive in [
            "otto.chat.engine=debug",
            "otto.agents=debug",
            "otto.llm.rotation=debug",
            "otto.tools.dispatch=debug",
        ] {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Honor -C before anything touches the filesystem
    if let Some(ref directory) = cli.directory {
        std::env::set_current_dir(directory)?;
    }

    // Load settings
    let settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    // Ensure directories exist
    Settings::ensure_directories()?;

    // Dispatch to appropriate command
    let verbose = cli.verbose;
    match cli.command {
        None => {
            run_chat(ChatArgs::default(), settings, verbose).await?;
        }
        Some(Commands::Chat(args)) => {
            run_chat(args, settings, verbose).await?;
        }
        Some(Commands::Ask(args)) => {
            run_ask(args, settings, verbose).await?;
        }
        Some(Commands::Agent(args)) => {
            run_agent(args, settings, verbose).await?;
        }
        Some(Commands::Models) => {
            run_models(settings).await?;
        }
        Some(Commands::History(args)) => {
            run_history_command(args)?;
        }
    }

    Ok(())
}

/// Run interactive chat mode
async fn run_chat(args: ChatArgs, settings: Settings, verbose: u8) -> Result<()> {
    if verbose > 0 {
        eprintln!("[verbose] Otto starting in chat mode");
        eprintln!(
            "[verbose] Working directory: {:?}",
            std::env::current_dir().ok()
        );
    }

    let ChatRuntimeSetup {
        mut engine,
        mut history_store,
        mut session_info,
        model,
        persona_name,
        working_directory,
    } = initialize_chat_runtime(&args, settings, verbose)?;

    print_welcome(&model, &persona_name, &session_info.id)?;

    // A prompt given on the command line becomes the first turn
    let mut queued_prompt = args.prompt.clone();

    // Main chat loop
    loop {
        let input = match queued_prompt.take() {
            Some(prompt) => {
                let mut stdout = io::stdout();
                stdout.execute(SetForegroundColor(Color::Green))?;
                print!("you: ");
                stdout.execute(ResetColor)?;
                println!("{}", prompt);
                io::stdout().flush()?;
                prompt
            }
            None => read_user_input()?,
        };

        // Check for shell command (starts with >)
        if input.trim().starts_with('>') {
            // Safe: we already verified the string starts with '>'
            let command = input
                .trim()
                .strip_prefix('>')
                .expect("input starts with '>'")
                .trim();
            if command.is_empty() {
                println!("\nUsage: >command [args...]");
                println!("Example: >ls -la");
                println!("Example: >git status\n");
                continue;
            }

            run_shell_passthrough(command)?;
            continue;
        }

        // Check for exit commands
        if utils::is_exit_command(&input) {
            println!("\nGoodbye!");
            break;
        }

        // Slash commands
        if let Some((command, _rest)) = utils::parse_slash_command(&input) {
            match command {
                "help" => {
                    print_help()?;
                }
                "clear" => {
                    let instruction = engine.session().system_instruction.clone();
                    engine.set_session(ConversationSession::new(instruction));
                    println!("\nConversation cleared.\n");
                }
                "new" => {
                    let new_info =
                        SessionInfo::new(Uuid::new_v4(), working_directory.clone(), model.clone());

                    let mut stdout = io::stdout();
                    stdout.execute(SetForegroundColor(Color::Green))?;
                    println!(
                        "\n✓ Started new session: {}",
                        &new_info.id.to_string()[..8]
                    );
                    stdout.execute(ResetColor)?;

                    session_info = new_info;
                    let instruction = engine.session().system_instruction.clone();
                    engine.set_session(ConversationSession::new(instruction));
                    println!("Conversation cleared. Ready for a fresh start.\n");
                }
                "session" => {
                    println!("\nSession: {}", session_info.id);
                    println!("Model: {}", engine.model());
                    println!("Messages: {}", engine.session().len());
                    println!(
                        "Started: {}\n",
                        session_info.started_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                _ => {
                    println!(
                        "\nUnknown command '/{}'. Type /help for commands.\n",
                        command
                    );
                }
            }
            continue;
        }

        // Skip empty input
        if input.trim().is_empty() {
            continue;
        }

        // Track turn count before the call so Ctrl+C can restore the
        // session: select! cancels the future mid-flight and the engine's
        // own cleanup never runs.
        let turns_before = engine.session().len();
        let first_turn = turns_before == 0;

        print_response_prefix()?;

        let turn_future = engine.run_turn(&input);
        let result = tokio::select! {
            result = turn_future => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        let Some(result) = result else {
            engine.session_mut().turns.truncate(turns_before);

            let mut stdout = io::stdout();
            println!();
            stdout.execute(SetForegroundColor(Color::Yellow))?;
            println!("\n⚡ Interrupted");
            stdout.execute(ResetColor)?;
            println!("Type your next message or use /help for commands.\n");
            continue;
        };

        match result {
            Ok(outcome) => {
                println!();
                print_tool_calls(&outcome.tool_calls)?;

                let mut stdout = io::stdout();
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("{}", token_line(&outcome));
                stdout.execute(ResetColor)?;

                offer_suggested_commands(&utils::extract_suggested_commands(
                    &outcome.final_text,
                ))?;
                println!();

                // Persist session metadata and the transcript
                session_info.touch();
                session_info.message_count = engine.session().len();
                if first_turn {
                    session_info.set_summary(&input);
                }

                let mut transcript = SessionTranscript::new(session_info.id, model.clone());
                transcript.started_at = session_info.started_at;
                transcript.turns = engine.session().turns.clone();

                history_store.upsert(session_info.clone())?;
                history_store.save_transcript(&transcript)?;
            }
            Err(e) => {
                engine.session_mut().turns.truncate(turns_before);
                eprintln!("\n{}", utils::format_error(&e));
            }
        }
    }

    Ok(())
}
