use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ClawLite - run one agent worker turn for a chat group
#[derive(Parser, Debug)]
#[command(name = "clawlite")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare the group's workspace and run one worker turn
    Run {
        /// Group folder (workspace key)
        #[arg(value_name = "GROUP_FOLDER")]
        group_folder: String,

        /// Worker input JSON. Use "-" to read from stdin
        #[arg(value_name = "INPUT_JSON")]
        input_json: String,

        /// Group display name (default: the folder)
        #[arg(long)]
        name: Option<String>,

        /// Run as the main group
        #[arg(long, default_value = "false")]
        main: bool,

        /// Print each streamed record as it arrives
        #[arg(long, default_value = "false")]
        stream: bool,

        /// Per-group timeout override in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// File holding worker credentials (never exported to this process)
        #[arg(long, value_name = "PATH", default_value = ".env")]
        env_file: PathBuf,

        /// JSON array of scheduled tasks to snapshot into the IPC directory
        #[arg(long, value_name = "PATH")]
        tasks: Option<PathBuf>,

        /// JSON array of known chats to snapshot into the IPC directory
        #[arg(long, value_name = "PATH")]
        groups: Option<PathBuf>,
    },

    /// Prepare the group's workspace and print the resolved paths
    Prepare {
        /// Group folder (workspace key)
        #[arg(value_name = "GROUP_FOLDER")]
        group_folder: String,

        /// Prepare as the main group
        #[arg(long, default_value = "false")]
        main: bool,
    },
}
