use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Seedling - a seed/sprout dual-root Arch Linux installer
#[derive(Parser)]
#[command(name = "seedling")]
#[command(about = "Install Arch Linux onto a read-only seed + writable sprout btrfs pair")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: narrate every command without touching devices.
    ///
    /// The full phase sequence executes and logs one line per planned
    /// operation; nothing is formatted, mounted or written.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the installer (TUI by default, headless with --config)
    Install {
        /// Path to a configuration file to use (skips the TUI)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Save the configuration assembled in the TUI to this path
        #[arg(long)]
        save_config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file to validate
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
