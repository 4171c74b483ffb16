//! Command-line interface.
//!
//! With no subcommand the binary starts an interactive session against
//! the configured pipeline service; `devices` and `languages` are
//! one-shot listings.

mod session_loop;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use session_loop::run_session;

#[derive(Parser, Debug)]
#[command(
    name = "voicerelay",
    version,
    about = "Terminal client for a speech transcription, translation and TTS pipeline"
)]
pub struct Cli {
    /// Subcommand to execute (default: interactive session)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding config.toml (default: OS config dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Pipeline service base URL (overrides config)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Default translation target language code (overrides config)
    #[arg(short, long, value_name = "LANG")]
    pub language: Option<String>,

    /// Audio input device name
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Directory for generated speech files (default: data dir)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Effective log level: the verbosity flags trump the configured one.
    pub fn log_level(&self, configured: &str) -> String {
        match self.verbose {
            0 => configured.to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// List supported translation languages
    Languages,
}
