//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tacma_core::ActivityId;

/// Priority-weighted task time tracker.
///
/// Tracks how long each task runs and compares it with the share of working
/// time its priority entitles it to.
#[derive(Debug, Parser)]
#[command(name = "tacma", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Add a new task.
    Add {
        /// Task title.
        name: String,

        /// Priority; time is shared in proportion to it.
        #[arg(short, long, default_value_t = 1.0)]
        priority: f64,

        /// Free-text comment.
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Start working on a task, stopping the running one.
    Start { id: ActivityId },

    /// Stop the running task.
    Stop,

    /// Change a task's priority from now on.
    Priority { id: ActivityId, value: f64 },

    /// Rename a task.
    Rename { id: ActivityId, name: String },

    /// Replace a task's comment.
    Comment { id: ActivityId, text: String },

    /// Mark a task as finished.
    Finish { id: ActivityId },

    /// Delete a task and its history.
    Remove { id: ActivityId },

    /// Show per-task statistics.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Evaluate at this time instead of now (ISO 8601 or "2 hours ago").
        #[arg(long)]
        at: Option<String>,
    },

    /// Inspect or correct recorded sessions.
    #[command(subcommand)]
    Session(SessionAction),

    /// Inspect or rewrite a task's priority history.
    #[command(subcommand)]
    PriorityLog(PriorityLogAction),

    /// Move old history into an archive file.
    Archive {
        /// Archive even if the history is not old enough yet.
        #[arg(long)]
        force: bool,
    },

    /// Print all data as JSON.
    Export,

    /// Write a backup copy of the database now.
    Backup,
}

/// Session subcommands.
#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// List a task's completed sessions.
    List { id: ActivityId },

    /// Record a session after the fact.
    Add {
        id: ActivityId,

        /// Session start (ISO 8601 or "2 hours ago").
        #[arg(long)]
        start: String,

        /// Session end (ISO 8601 or "2 hours ago").
        #[arg(long)]
        end: String,
    },

    /// Delete a session by its number in `session list`.
    Remove { id: ActivityId, index: usize },

    /// Replace the whole toggle log with the given start/stop times.
    Set {
        id: ActivityId,

        /// Alternating start and stop times (ISO 8601 or "2 hours ago").
        times: Vec<String>,
    },
}

/// Priority history subcommands.
#[derive(Debug, Subcommand)]
pub enum PriorityLogAction {
    /// List every priority change of a task.
    List { id: ActivityId },

    /// Replace the priority history.
    Set {
        id: ActivityId,

        /// Changes as TIME=PRIORITY, oldest first.
        #[arg(required = true)]
        changes: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_session_add() {
        let cli = Cli::parse_from([
            "tacma",
            "session",
            "add",
            "3",
            "--start",
            "2 hours ago",
            "--end",
            "1 hour ago",
        ]);
        let Some(Commands::Session(SessionAction::Add { id, start, end })) = cli.command else {
            panic!("unexpected parse: {cli:?}");
        };
        assert_eq!(id, ActivityId::new(3));
        assert_eq!(start, "2 hours ago");
        assert_eq!(end, "1 hour ago");
    }

    #[test]
    fn parses_priority_log_set() {
        let cli = Cli::parse_from([
            "tacma",
            "priority-log",
            "set",
            "1",
            "2025-05-05T09:00:00Z=1",
            "1 hour ago=2.5",
        ]);
        let Some(Commands::PriorityLog(PriorityLogAction::Set { id, changes })) = cli.command
        else {
            panic!("unexpected parse: {cli:?}");
        };
        assert_eq!(id, ActivityId::new(1));
        assert_eq!(changes, vec!["2025-05-05T09:00:00Z=1", "1 hour ago=2.5"]);
        assert!(Cli::try_parse_from(["tacma", "priority-log", "set", "1"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["tacma", "start", "abc"]).is_err());
    }
}
