// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use indicatif::ProgressBar;

use otto::agents::{AgentOrchestrator, AgentProgressEvent, StopReason};
use otto::cli::AgentArgs;
use otto::config::Settings;
use otto::error::Result;
use otto::llm::factory::ProviderFactory;
use otto::llm::rotation::RotationPolicy;

use super::chat_runtime::{build_dispatcher, check_provider_configuration};

/// Drive progress events onto the spinner until the channel closes.
///
/// Transient states (thinking, observing) become the spinner message;
/// milestones (classification, plan, dispatched actions) are printed
/// above it so they survive the run.
async fn display_progress(
    spinner: ProgressBar,
    mut events: tokio::sync::mpsc::UnboundedReceiver<AgentProgressEvent>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            AgentProgressEvent::Classified { .. }
            | AgentProgressEvent::PlanReady { .. }
            | AgentProgressEvent::ActionDispatched { .. }
            | AgentProgressEvent::SessionRebuilt { .. } => {
                spinner.println(format!("  {}", event.status_text()));
            }
            _ => {
                spinner.set_message(event.status_text());
            }
        }
    }
}

/// Run the autonomous agent toward a goal and print the outcome.
pub(super) async fn run_agent(args: AgentArgs, settings: Settings, verbose: u8) -> Result<()> {
    check_provider_configuration(&settings)?;

    let pool = ProviderFactory::credential_pool(&settings)?;
    let provider = ProviderFactory::create(&settings, &pool);
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| settings.provider.agent_model.clone());

    let working_directory = std::env::current_dir()?;
    let mut stdout = io::stdout();

    if args.dry_run {
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!("Dry run: tool calls will be logged, not executed.\n");
        stdout.execute(ResetColor)?;
    }
    if verbose > 0 {
        eprintln!("[verbose] Agent model: {}", model);
        eprintln!("[verbose] Credential pool size: {}", pool.len());
    }

    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("Goal: {}", args.goal);
    stdout.execute(ResetColor)?;
    println!();

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));

    let dispatcher = build_dispatcher(&settings, working_directory)
        .with_dry_run(args.dry_run)
        .with_spinner(spinner.clone());

    let react_steps = args.max_steps.unwrap_or(settings.agent.max_react_steps);
    let executor_steps = args.max_steps.unwrap_or(settings.agent.max_executor_steps);

    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
    let display = tokio::spawn(display_progress(spinner.clone(), receiver));

    let mut orchestrator = AgentOrchestrator::new(provider, pool, dispatcher, model)
        .with_policy(RotationPolicy::from(&settings.resilience))
        .with_step_limits(react_steps, executor_steps)
        .with_generation(settings.defaults.max_tokens, settings.defaults.temperature)
        .with_progress(sender);

    let run = orchestrator.run(&args.goal);
    let result = tokio::select! {
        result = run => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    spinner.finish_and_clear();
    // Dropping the orchestrator closes the progress channel
    drop(orchestrator);
    let _ = display.await;

    let Some(result) = result else {
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!("\n⚡ Interrupted");
        stdout.execute(ResetColor)?;
        return Ok(());
    };
    let outcome = result?;

    match outcome.stop_reason {
        StopReason::Finished => {
            stdout.execute(SetForegroundColor(Color::Cyan))?;
            print!("\notto: ");
            stdout.execute(ResetColor)?;
            println!(
                "{}",
                outcome.answer.as_deref().unwrap_or("Task complete.")
            );
        }
        StopReason::StepLimitReached => {
            stdout.execute(SetForegroundColor(Color::Yellow))?;
            println!(
                "\n⚠ Stopped after {} steps without finishing. Partial progress \
                 is recorded above; re-run with --max-steps to allow more.",
                outcome.steps_taken
            );
            stdout.execute(ResetColor)?;
        }
    }

    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    println!(
        "\n[{} steps, {} tool calls]",
        outcome.steps_taken,
        outcome.tool_calls.len()
    );
    stdout.execute(ResetColor)?;

    Ok(())
}
