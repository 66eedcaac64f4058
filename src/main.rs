//! Seedling - Main entry point
//!
//! Dispatches between the TUI wizard, headless installation from a
//! configuration file, and configuration validation.

use anyhow::{bail, Context};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::stdout;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use seedling::app::App;
use seedling::cli::{Cli, Commands};
use seedling::config::InstallConfig;
use seedling::installer::Installer;
use seedling::sink::StdoutSink;
use seedling::Runner;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("seedling starting up");

    let cli = Cli::parse_args();

    match cli.command {
        Some(Commands::Validate { config }) => {
            info!(path = ?config, "validating configuration file");
            let config = InstallConfig::load_from_file(&config)
                .context("failed to load configuration file")?;
            match config.validate() {
                Ok(()) => println!("configuration is valid"),
                Err(e) => {
                    error!("configuration validation failed: {e}");
                    eprintln!("configuration validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Install {
            config: Some(config_path),
            ..
        }) => {
            run_headless_install(&config_path, cli.dry_run)?;
        }
        Some(Commands::Install {
            config: None,
            save_config,
        }) => {
            run_tui_installer(cli.dry_run, save_config)?;
        }
        None => {
            run_tui_installer(cli.dry_run, None)?;
        }
    }

    Ok(())
}

/// Run an installation from a configuration file, printing sink lines to
/// stdout.
fn run_headless_install(config_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    info!(path = ?config_path, "loading configuration");
    let mut config = InstallConfig::load_from_file(config_path)
        .context("failed to load configuration file")?;
    config.dry_run = config.dry_run || dry_run;
    config.validate().context("invalid configuration")?;

    ensure_root(config.dry_run)?;

    let runner = Runner::with_dry_run(config.dry_run);
    let sink = StdoutSink;
    let result = Installer::new(&config, &runner, &sink).run();

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("installation aborted: {e}");
            std::process::exit(1);
        }
    }
}

/// Run the TUI wizard.
fn run_tui_installer(dry_run: bool, save_path: Option<PathBuf>) -> anyhow::Result<()> {
    ensure_root(dry_run)?;
    debug!("initializing terminal for TUI mode");

    enable_raw_mode().context("failed to enable raw mode")?;
    crossterm::execute!(stdout(), crossterm::terminal::EnterAlternateScreen)
        .context("failed to enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

    let mut app = App::new(dry_run, save_path);
    let result = app.run(&mut terminal);

    // Always restore the terminal, even if the app failed.
    let _ = disable_raw_mode();
    let _ = crossterm::execute!(stdout(), crossterm::terminal::LeaveAlternateScreen);

    result
}

/// Formatting real block devices needs EUID 0. Simulated runs do not.
fn ensure_root(dry_run: bool) -> anyhow::Result<()> {
    if !dry_run && !nix::unistd::geteuid().is_root() {
        bail!("root privileges required; run with sudo, or pass --dry-run to simulate");
    }
    Ok(())
}
