use clap::{Parser, Subcommand};

use workplan::model::{TaskId, DEFAULT_COLUMN, RESTORE_COLUMN};

#[derive(Parser)]
#[command(name = "workplan", about = "Kanban board for your work plans", version)]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.workplan/workplan.db]
    #[arg(long, env = "WORKPLAN_DB", global = true)]
    pub db: Option<String>,

    /// Talk to a `workplan serve` instance instead of the local database
    #[arg(long, env = "WORKPLAN_SERVER", global = true)]
    pub server: Option<String>,

    /// Path to the client config [default: ~/.workplan/config.toml]
    #[arg(long, env = "WORKPLAN_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List tasks by column
    List {
        /// Only this column
        #[arg(short, long)]
        column: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one task in full
    Show {
        id: TaskId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a task to the end of a column
    Add {
        title: String,
        /// Target column [default: in-progress]
        #[arg(short, long)]
        column: Option<String>,
        #[arg(short, long)]
        desc: Option<String>,
        /// Follow-up note
        #[arg(short, long)]
        followup: Option<String>,
    },

    /// Add one task per line of stdin (list markers are stripped)
    #[command(name = "add-many")]
    AddMany {
        #[arg(short, long, default_value = DEFAULT_COLUMN)]
        column: String,
    },

    /// Edit a task's text
    Edit {
        id: TaskId,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        desc: Option<String>,
        #[arg(short, long)]
        followup: Option<String>,
    },

    /// Move a task to a column, at the end or at --index
    Mv {
        id: TaskId,
        column: String,
        /// Zero-based slot in the target column
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Swap a task with its neighbour (up or down)
    Nudge { id: TaskId, direction: String },

    /// Move a task to the archive
    Archive { id: TaskId },

    /// Bring an archived task back
    Restore {
        id: TaskId,
        /// Column to restore into
        #[arg(long = "to", default_value = RESTORE_COLUMN)]
        column: String,
    },

    /// Delete a task permanently
    Rm { id: TaskId },

    /// Write the whole board as JSON
    Export {
        /// Output file [default: stdout]
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load tasks from an export file
    Import {
        file: String,
        /// replace (delete everything first) or append
        #[arg(long, default_value = "replace")]
        mode: String,
    },

    /// Show or change client preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Launch the interactive board
    Board,

    /// Serve the REST API over the database
    Serve {
        #[arg(long, env = "PORT", default_value = "3000")]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Seconds between background syncs (0 disables)
    Interval { seconds: u64 },
    /// Show a hidden column on the board
    Show { column: String },
    /// Hide a column on the board
    Hide { column: String },
    /// Print the effective config
    Print,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn restore_defaults_to_planned() {
        let cli = Cli::try_parse_from(["workplan", "restore", "4"]).unwrap();
        match cli.command {
            Command::Restore { id, column } => {
                assert_eq!(id, 4);
                assert_eq!(column, "planned");
            }
            _ => panic!("expected restore"),
        }
    }

    #[test]
    fn mv_with_index() {
        let cli = Cli::try_parse_from(["workplan", "mv", "2", "completed", "--index", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Mv { id: 2, ref column, index: Some(0) } if column == "completed"
        ));
    }
}
