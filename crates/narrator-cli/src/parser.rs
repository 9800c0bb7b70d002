//! Main CLI parser and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Read text files aloud, paragraph by paragraph.
#[derive(Parser)]
#[command(name = "narrator")]
#[command(about = "Read text files aloud through a text-to-speech server")]
#[command(version)]
pub struct Cli {
    /// Base URL of the generation server (overrides the saved setting)
    #[arg(long = "server-url", env = "NARRATOR_SERVER_URL", global = true)]
    pub server_url: Option<String>,

    /// Directory for settings and bookmarks
    #[arg(long = "data-dir", env = "NARRATOR_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
