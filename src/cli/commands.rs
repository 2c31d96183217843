use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mindchat-history")]
#[command(
    author,
    version,
    about = "Inspect and edit local Mind-Chat conversation history",
    long_about = None
)]
pub struct Cli {
    /// Override the history data directory from settings
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep history in memory only; nothing is read from or written to disk
    #[arg(long, global = true, conflicts_with = "data_dir")]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured conversation modes
    Modes,

    /// List conversations in a mode, most recent first
    List {
        /// Mode key (e.g. counseling, plain); defaults to the configured default mode
        mode: Option<String>,
    },

    /// Show every turn of one conversation
    Show { mode: String, id: String },

    /// Start a new conversation
    New { mode: String, message: String },

    /// Append a turn to a conversation
    Append {
        mode: String,
        id: String,
        text: String,

        /// Record the turn as the assistant's reply instead of the user's
        #[arg(short, long)]
        assistant: bool,
    },

    /// Toggle the favorite flag of a conversation
    Favorite { mode: String, id: String },

    /// Delete a conversation
    Delete { mode: String, id: String },

    /// Drop a trailing user turn that never got a reply
    UndoUser { mode: String, id: String },
}
