// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Otto.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Otto - resilient LLM assistant for your terminal
#[derive(Parser, Debug)]
#[command(name = "otto")]
#[command(version, about = "Resilient LLM assistant for your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Working directory (defaults to current)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Run an autonomous agent toward a goal
    Agent(AgentArgs),

    /// List available models
    Models,

    /// History management
    History(HistoryArgs),
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Initial prompt (optional)
    pub prompt: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Persona to adopt for the session
    #[arg(short, long)]
    pub persona: Option<String>,

    /// Disable streaming output
    #[arg(long)]
    pub no_stream: bool,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Read additional context from stdin
    #[arg(long)]
    pub stdin: bool,
}

/// Arguments for the agent subcommand
#[derive(clap::Args, Debug)]
pub struct AgentArgs {
    /// Goal for the agent to accomplish
    pub goal: String,

    /// Log tool calls without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Override the step ceiling for this run
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for history management
#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommands,
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recent sessions
    List {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show a specific session
    Show {
        /// Session ID
        session_id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID
        session_id: String,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    // ==================== CLI Global Arguments ====================

    #[test]
    fn test_cli_default_no_command() {
        let cli = Cli::parse_from(["otto"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_verbose_single() {
        let cli = Cli::parse_from(["otto", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_verbose_multiple() {
        let cli = Cli::parse_from(["otto", "-vvv"]);
        assert_eq!(cli.verbose, 3);
    }

    #[test]
    fn test_cli_directory_short() {
        let cli = Cli::parse_from(["otto", "-C", "/some/path"]);
        assert_eq!(cli.directory, Some(PathBuf::from("/some/path")));
    }

    #[test]
    fn test_cli_directory_long() {
        let cli = Cli::parse_from(["otto", "--directory", "/other/path"]);
        assert_eq!(cli.directory, Some(PathBuf::from("/other/path")));
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["otto", "--config", "/path/to/settings.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/settings.json")));
    }

    #[test]
    fn test_cli_global_flag_after_subcommand() {
        let cli = Cli::parse_from(["otto", "chat", "-v"]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Some(Commands::Chat(_))));
    }

    // ==================== Chat Command ====================

    #[test]
    fn test_chat_command_basic() {
        let cli = Cli::parse_from(["otto", "chat"]);
        assert!(matches!(cli.command, Some(Commands::Chat(_))));
    }

    #[test]
    fn test_chat_with_prompt() {
        let cli = Cli::parse_from(["otto", "chat", "Hello, Otto!"]);
        if let Some(Commands::Chat(args)) = cli.command {
            assert_eq!(args.prompt, Some("Hello, Otto!".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_chat_with_model() {
        let cli = Cli::parse_from(["otto", "chat", "--model", "gemini-pro-latest"]);
        if let Some(Commands::Chat(args)) = cli.command {
            assert_eq!(args.model, Some("gemini-pro-latest".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_chat_with_persona() {
        let cli = Cli::parse_from(["otto", "chat", "-p", "reviewer"]);
        if let Some(Commands::Chat(args)) = cli.command {
            assert_eq!(args.persona, Some("reviewer".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_chat_no_stream() {
        let cli = Cli::parse_from(["otto", "chat", "--no-stream"]);
        if let Some(Commands::Chat(args)) = cli.command {
            assert!(args.no_stream);
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_chat_defaults() {
        let cli = Cli::parse_from(["otto", "chat"]);
        if let Some(Commands::Chat(args)) = cli.command {
            assert!(args.prompt.is_none());
            assert!(args.model.is_none());
            assert!(args.persona.is_none());
            assert!(!args.no_stream);
        } else {
            panic!("Expected Chat command");
        }
    }

    // ==================== Ask Command ====================

    #[test]
    fn test_ask_command() {
        let cli = Cli::parse_from(["otto", "ask", "What is Rust?"]);
        if let Some(Commands::Ask(args)) = cli.command {
            assert_eq!(args.prompt, "What is Rust?");
            assert!(!args.stdin);
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_ask_requires_prompt() {
        let result = Cli::try_parse_from(["otto", "ask"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ask_with_stdin() {
        let cli = Cli::parse_from(["otto", "ask", "--stdin", "summarize this"]);
        if let Some(Commands::Ask(args)) = cli.command {
            assert!(args.stdin);
            assert_eq!(args.prompt, "summarize this");
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_ask_with_model() {
        let cli = Cli::parse_from(["otto", "ask", "-m", "gemini-flash-latest", "hi"]);
        if let Some(Commands::Ask(args)) = cli.command {
            assert_eq!(args.model, Some("gemini-flash-latest".to_string()));
        } else {
            panic!("Expected Ask command");
        }
    }

    // ==================== Agent Command ====================

    #[test]
    fn test_agent_command() {
        let cli = Cli::parse_from(["otto", "agent", "create a flask app"]);
        if let Some(Commands::Agent(args)) = cli.command {
            assert_eq!(args.goal, "create a flask app");
            assert!(!args.dry_run);
            assert!(args.max_steps.is_none());
        } else {
            panic!("Expected Agent command");
        }
    }

    #[test]
    fn test_agent_requires_goal() {
        let result = Cli::try_parse_from(["otto", "agent"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_dry_run() {
        let cli = Cli::parse_from(["otto", "agent", "--dry-run", "list the files"]);
        if let Some(Commands::Agent(args)) = cli.command {
            assert!(args.dry_run);
        } else {
            panic!("Expected Agent command");
        }
    }

    #[test]
    fn test_agent_max_steps() {
        let cli = Cli::parse_from(["otto", "agent", "--max-steps", "5", "do a thing"]);
        if let Some(Commands::Agent(args)) = cli.command {
            assert_eq!(args.max_steps, Some(5));
        } else {
            panic!("Expected Agent command");
        }
    }

    #[test]
    fn test_agent_with_model() {
        let cli = Cli::parse_from(["otto", "agent", "-m", "gemini-pro-latest", "refactor"]);
        if let Some(Commands::Agent(args)) = cli.command {
            assert_eq!(args.model, Some("gemini-pro-latest".to_string()));
        } else {
            panic!("Expected Agent command");
        }
    }

    // ==================== Models Command ====================

    #[test]
    fn test_models_command() {
        let cli = Cli::parse_from(["otto", "models"]);
        assert!(matches!(cli.command, Some(Commands::Models)));
    }

    // ==================== History Command ====================

    #[test]
    fn test_history_list_default_limit() {
        let cli = Cli::parse_from(["otto", "history", "list"]);
        if let Some(Commands::History(args)) = cli.command {
            assert!(matches!(args.command, HistoryCommands::List { limit: 10 }));
        } else {
            panic!("Expected History command");
        }
    }

    #[test]
    fn test_history_list_custom_limit() {
        let cli = Cli::parse_from(["otto", "history", "list", "--limit", "25"]);
        if let Some(Commands::History(args)) = cli.command {
            assert!(matches!(args.command, HistoryCommands::List { limit: 25 }));
        } else {
            panic!("Expected History command");
        }
    }

    #[test]
    fn test_history_show() {
        let cli = Cli::parse_from(["otto", "history", "show", "abc12345"]);
        if let Some(Commands::History(args)) = cli.command {
            if let HistoryCommands::Show { session_id } = args.command {
                assert_eq!(session_id, "abc12345");
            } else {
                panic!("Expected Show subcommand");
            }
        } else {
            panic!("Expected History command");
        }
    }

    #[test]
    fn test_history_delete() {
        let cli = Cli::parse_from(["otto", "history", "delete", "abc12345"]);
        if let Some(Commands::History(args)) = cli.command {
            assert!(matches!(args.command, HistoryCommands::Delete { .. }));
        } else {
            panic!("Expected History command");
        }
    }

    #[test]
    fn test_history_clear_force() {
        let cli = Cli::parse_from(["otto", "history", "clear", "--force"]);
        if let Some(Commands::History(args)) = cli.command {
            assert!(matches!(args.command, HistoryCommands::Clear { force: true }));
        } else {
            panic!("Expected History command");
        }
    }

    #[test]
    fn test_history_requires_subcommand() {
        let result = Cli::try_parse_from(["otto", "history"]);
        assert!(result.is_err());
    }
}
