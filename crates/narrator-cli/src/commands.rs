//! Subcommand definitions.

use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Read a text file aloud
    ///
    /// Paragraphs are separated by blank lines. While playing, type a key
    /// and press Enter: p pause, r resume or retry, n next, b back, s stop.
    Play {
        /// Text file to read
        file: PathBuf,
        /// Paragraph to start at (0-based)
        #[arg(long, conflicts_with = "resume")]
        from: Option<usize>,
        /// Continue from the saved bookmark
        #[arg(long)]
        resume: bool,
    },
    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show all current settings
    Show,
    /// Update settings
    Set {
        /// Paragraphs to generate ahead of the one playing (1-50)
        #[arg(long)]
        target: Option<usize>,
        /// Paragraphs that must be ready ahead before playback starts
        #[arg(long)]
        min: Option<usize>,
        /// Base URL of the generation server
        #[arg(long)]
        server_url: Option<String>,
        /// Voice name
        #[arg(long)]
        voice: Option<String>,
        /// Language code
        #[arg(long)]
        language: Option<String>,
        /// Speaking rate requested from the server
        #[arg(long)]
        generation_speed: Option<f32>,
        /// Sampling temperature requested from the server
        #[arg(long)]
        temperature: Option<f32>,
        /// Local playback rate (0.5-3.0)
        #[arg(long)]
        playback_speed: Option<f32>,
        /// Keep pitch when changing playback rate
        #[arg(long)]
        preserves_pitch: Option<bool>,
    },
    /// Reset all settings to defaults
    Reset,
}
