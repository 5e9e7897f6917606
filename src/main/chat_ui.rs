// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use otto::chat::TurnOutcome;
use otto::error::Result;
use otto::tools::ToolCallRecord;

/// Maximum lines to show for shell output before collapsing
pub(super) const SHELL_OUTPUT_MAX_LINES: usize = 15;

/// Dispatcher failure observations all start with "Error" or are the
/// fixed denial sentence; everything else reached the tool and succeeded.
pub(super) fn is_error_result(result: &str) -> bool {
    result.starts_with("Error") || result == "Operation denied by user."
}

/// Truncate a display line, ellipsis included in the budget
pub(super) fn truncate_line(line: &str, max: usize) -> String {
    if line.chars().count() > max {
        let kept: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        line.to_string()
    }
}

/// Token usage line shown after each completed turn
pub(super) fn token_line(outcome: &TurnOutcome) -> String {
    match outcome.token_limit {
        Some(limit) => format!("[tokens: {}/{}]", outcome.usage.total(), limit),
        None => format!("[tokens: {}]", outcome.usage.total()),
    }
}

/// Print the audit trail of a completed turn as invocation/result frames
pub(super) fn print_tool_calls(records: &[ToolCallRecord]) -> Result<()> {
    for record in records {
        print_tool_invocation(&record.tool_name, &record.tool_args)?;
        print_tool_result(record)?;
    }
    Ok(())
}

/// Print tool invocation with visual formatting
pub(super) fn print_tool_invocation(tool_name: &str, input: &serde_json::Value) -> Result<()> {
    let mut stdout = io::stdout();

    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("  ╭─ ");
    stdout.execute(SetForegroundColor(Color::Magenta))?;
    print!("{}", tool_name);
    stdout.execute(ResetColor)?;

    // Print the most telling argument per tool
    match tool_name {
        "read_file" => {
            if let Some(path) = input["path"].as_str() {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                print!(" → ");
                stdout.execute(SetForegroundColor(Color::Blue))?;
                println!("{}", path);
            } else {
                println!();
            }
        }
        "write_file" | "create_directory" => {
            if let Some(path) = input["path"].as_str() {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                print!(" → ");
                stdout.execute(SetForegroundColor(Color::Green))?;
                println!("{}", path);
            } else {
                println!();
            }
        }
        "list_directory" => {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            print!(" → ");
            stdout.execute(SetForegroundColor(Color::Blue))?;
            println!("{}", input["path"].as_str().unwrap_or("."));
        }
        "execute_shell_command" => {
            if let Some(command) = input["command"].as_str() {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                print!(" → ");
                stdout.execute(SetForegroundColor(Color::Cyan))?;
                println!("{}", truncate_line(command, 60));
            } else {
                println!();
            }
        }
        "query_database" => {
            if let Some(sql) = input["sql"].as_str() {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                print!(" → ");
                stdout.execute(SetForegroundColor(Color::Yellow))?;
                println!("{}", truncate_line(sql, 60));
            } else {
                println!();
            }
        }
        "web_search" => {
            if let Some(query) = input["query"].as_str() {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                print!(" → ");
                stdout.execute(SetForegroundColor(Color::Blue))?;
                println!("{}", truncate_line(query, 60));
            } else {
                println!();
            }
        }
        _ => {
            println!();
        }
    }

    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

/// Print tool result with visual formatting
pub(super) fn print_tool_result(record: &ToolCallRecord) -> Result<()> {
    let mut stdout = io::stdout();
    let result = record.result.as_str();

    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("  ╰─ ");

    if result.starts_with("[dry-run]") {
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        print!("○ ");
        stdout.execute(ResetColor)?;
        println!("{}", truncate_line(result, 100));
        stdout.execute(ResetColor)?;
        stdout.flush()?;
        return Ok(());
    }

    if is_error_result(result) {
        stdout.execute(SetForegroundColor(Color::Red))?;
        print!("✗ ");
        // Show the first few lines of the error for context
        let error_lines: Vec<_> = result.lines().take(5).collect();
        if error_lines.len() == 1 {
            println!("{}", truncate_line(error_lines[0], 80));
        } else {
            println!();
            for line in error_lines {
                stdout.execute(SetForegroundColor(Color::Red))?;
                println!("     {}", line);
            }
        }
    } else {
        stdout.execute(SetForegroundColor(Color::Green))?;
        print!("✓ ");
        stdout.execute(ResetColor)?;

        match record.tool_name.as_str() {
            "read_file" => {
                println!("Read {} lines", result.lines().count());
            }
            "write_file" | "create_directory" => {
                let msg = result.lines().next().unwrap_or("Done");
                println!("{}", truncate_line(msg, 80));
            }
            "execute_shell_command" => {
                print_shell_output(result)?;
            }
            "list_directory" => {
                let count = result.lines().count();
                if count == 1 {
                    println!("{}", truncate_line(result, 80));
                } else {
                    println!("Listed {} entries", count);
                }
            }
            "query_database" => {
                // The summary is the last line: "(N rows)" or the no-rows note
                let summary = result.lines().last().unwrap_or("Done");
                println!("{}", truncate_line(summary, 80));
            }
            "web_search" => {
                if result.starts_with("No results") {
                    println!("{}", truncate_line(result, 80));
                } else {
                    println!("Found {} results", result.split("\n\n").count());
                }
            }
            _ => {
                println!("Done");
            }
        }
    }

    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

/// Exit code parsed from a shell tool capture, "0" when absent
pub(super) fn shell_exit_code(output: &str) -> &str {
    output
        .lines()
        .find(|l| l.starts_with("Exit code:"))
        .and_then(|l| l.strip_prefix("Exit code: "))
        .unwrap_or("0")
}

/// Content lines of a shell tool capture, metadata stripped
pub(super) fn shell_content_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|l| !l.starts_with("Exit code:") && !l.starts_with("---") && !l.is_empty())
        .collect()
}

/// Print captured shell output with smart collapsing
pub(super) fn print_shell_output(output: &str) -> Result<()> {
    let mut stdout = io::stdout();

    let exit_code = shell_exit_code(output);
    let content_lines = shell_content_lines(output);
    let total_lines = content_lines.len();

    if exit_code == "0" {
        if total_lines == 0 {
            println!("Command completed (no output)");
        } else if total_lines <= SHELL_OUTPUT_MAX_LINES {
            println!("Command completed ({} lines):", total_lines);
            for line in &content_lines {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("     {}", truncate_line(line, 120));
            }
        } else {
            println!("Command completed ({} lines):", total_lines);

            // First and last few lines with a collapse marker between
            let show_start = 5;
            let show_end = 5;

            for line in content_lines.iter().take(show_start) {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("     {}", truncate_line(line, 120));
            }

            let hidden = total_lines - show_start - show_end;
            if hidden > 0 {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("     ┄┄┄ {} more lines ┄┄┄", hidden);
            }

            for line in content_lines.iter().skip(total_lines - show_end) {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("     {}", truncate_line(line, 120));
            }
        }
    } else {
        // Non-zero exit: show more context for debugging
        stdout.execute(SetForegroundColor(Color::Red))?;
        println!("Command failed (exit code {})", exit_code);

        let show_lines = std::cmp::min(total_lines, 20);
        for line in content_lines.iter().take(show_lines) {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            println!("     {}", truncate_line(line, 120));
        }

        if total_lines > show_lines {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            println!("     ... and {} more lines", total_lines - show_lines);
        }
    }

    stdout.execute(ResetColor)?;
    Ok(())
}

/// Execute a shell command directly, with the same frame as tool calls.
///
/// Used by the `>command` passthrough and approved suggested commands.
/// Runs outside the tool allowlist; the operator typed or approved it.
pub(super) fn run_shell_passthrough(command: &str) -> Result<()> {
    let mut stdout = io::stdout();

    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!("  ╭─ ");
    stdout.execute(SetForegroundColor(Color::Magenta))?;
    print!("shell");
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    print!(" → ");
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("{}", truncate_line(command, 60));
    stdout.execute(ResetColor)?;

    let output = std::process::Command::new("sh").arg("-c").arg(command).output();

    match output {
        Ok(result) => {
            let stdout_text = String::from_utf8_lossy(&result.stdout);
            let stderr_text = String::from_utf8_lossy(&result.stderr);
            let exit_code = result.status.code().unwrap_or(-1);

            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            print!("  ╰─ ");

            if exit_code == 0 {
                stdout.execute(SetForegroundColor(Color::Green))?;
                print!("✓ ");
                stdout.execute(ResetColor)?;

                if stdout_text.trim().is_empty() && stderr_text.trim().is_empty() {
                    println!("Command completed (no output)");
                } else {
                    let output_lines: Vec<_> =
                        stdout_text.lines().chain(stderr_text.lines()).collect();
                    let total_lines = output_lines.len();

                    println!("Command completed ({} lines):", total_lines);
                    if total_lines <= SHELL_OUTPUT_MAX_LINES {
                        for line in &output_lines {
                            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                            println!("     {}", truncate_line(line, 120));
                        }
                    } else {
                        for line in output_lines.iter().take(5) {
                            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                            println!("     {}", truncate_line(line, 120));
                        }
                        stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                        println!("     ┄┄┄ {} more lines ┄┄┄", total_lines - 10);
                        for line in output_lines.iter().skip(total_lines - 5) {
                            println!("     {}", truncate_line(line, 120));
                        }
                    }
                    stdout.execute(ResetColor)?;
                }
            } else {
                stdout.execute(SetForegroundColor(Color::Red))?;
                print!("✗ ");
                stdout.execute(ResetColor)?;
                println!("Command failed (exit code {})", exit_code);

                let error_output = if !stderr_text.trim().is_empty() {
                    stderr_text.trim()
                } else {
                    stdout_text.trim()
                };
                for line in error_output.lines().take(10) {
                    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                    println!("     {}", truncate_line(line, 120));
                }
                stdout.execute(ResetColor)?;
            }
        }
        Err(e) => {
            stdout.execute(SetForegroundColor(Color::Red))?;
            println!("✗ Failed to execute command: {}", e);
            stdout.execute(ResetColor)?;
        }
    }

    println!();
    Ok(())
}

/// Offer fenced shell commands from a response for execution, one by one
pub(super) fn offer_suggested_commands(commands: &[String]) -> Result<()> {
    let mut stdout = io::stdout();

    for command in commands {
        println!();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        print!("! ");
        stdout.execute(ResetColor)?;
        println!("The response suggests a shell command:");
        stdout.execute(SetForegroundColor(Color::DarkGrey))?;
        println!("  | {}", command);
        stdout.execute(ResetColor)?;
        print!("Run this command? [y/N]: ");
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            run_shell_passthrough(command)?;
        }
    }
    Ok(())
}
