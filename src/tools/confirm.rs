// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Operator confirmation for destructive writes
//!
//! The dispatcher asks the operator before performing any file write a tool
//! requested. Denial is a normal outcome, not an error.

use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;

/// How many payload lines the prompt shows before eliding
const PREVIEW_LINES: usize = 12;

/// Asks the operator to approve a pending write
pub trait ConfirmationPrompt: Send + Sync {
    /// Display the pending action and return whether it was approved.
    /// Anything other than an explicit yes counts as denial.
    fn confirm(&self, description: &str, payload: &str) -> Result<bool>;
}

/// Interactive prompt on the controlling terminal
pub struct TerminalPrompt;

impl ConfirmationPrompt for TerminalPrompt {
    fn confirm(&self, description: &str, payload: &str) -> Result<bool> {
        let mut stdout = io::stdout();

        println!();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        print!("! ");
        stdout.execute(ResetColor)?;
        println!("{}", description);

        if !payload.is_empty() {
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            for line in preview_lines(payload) {
                println!("  | {}", line);
            }
            stdout.execute(ResetColor)?;
        }

        print!("Apply this change? [y/N]: ");
        stdout.flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        println!();

        Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

fn preview_lines(payload: &str) -> Vec<String> {
    let mut lines: Vec<String> = payload
        .lines()
        .take(PREVIEW_LINES)
        .map(|l| l.to_string())
        .collect();
    let total = payload.lines().count();
    if total > PREVIEW_LINES {
        lines.push(format!("... ({} more lines)", total - PREVIEW_LINES));
    }
    lines
}

/// Describe a pending file write for the prompt
pub fn describe_write(path: &Path, payload: &str) -> String {
    format!(
        "The assistant wants to write {} ({} bytes, {} lines)",
        path.display(),
        payload.len(),
        payload.lines().count()
    )
}

/// Prompt double that answers from a script. Used by tests and dry runs.
pub struct ScriptedPrompt {
    answers: std::sync::Mutex<Vec<bool>>,
    asked: std::sync::atomic::AtomicUsize,
}

impl ScriptedPrompt {
    /// Always answer the same way
    pub fn always(answer: bool) -> Self {
        Self {
            answers: std::sync::Mutex::new(vec![answer]),
            asked: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Answer from a sequence; the last answer repeats
    pub fn sequence(answers: Vec<bool>) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers),
            asked: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many times the prompt was shown
    pub fn times_asked(&self) -> usize {
        self.asked.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl ConfirmationPrompt for ScriptedPrompt {
    fn confirm(&self, _description: &str, _payload: &str) -> Result<bool> {
        let index = self
            .asked
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let answers = match self.answers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if answers.is_empty() {
            return Ok(false);
        }
        Ok(answers[index.min(answers.len() - 1)])
    }
}
