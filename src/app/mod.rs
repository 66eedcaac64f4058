//! Application event loop
//!
//! Drives the wizard: draws the current screen, routes key events, and,
//! once the user confirms the summary, spawns the installation worker.
//! The worker owns the [`Installer`] outright; this thread only drains its
//! event channel. Once a run has started there is no way to cancel it; the
//! run always proceeds to a terminal state.

pub mod state;

use crate::config::InstallConfig;
use crate::disks;
use crate::exec::Runner;
use crate::installer::Installer;
use crate::sink::LogSink;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use state::{
    AppState, InstallEvent, Screen, FIELD_USER_CONFIRM, PART_FIELD_FORMAT_EFI, PART_FIELD_SEED,
};
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Forwards sink lines from the installation worker into the UI channel.
pub struct EventSink {
    tx: Mutex<Sender<InstallEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<InstallEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl LogSink for EventSink {
    fn line(&self, line: &str) {
        if let Ok(tx) = self.tx.lock() {
            // Send failure means the UI is gone; nothing sensible to do.
            let _ = tx.send(InstallEvent::Line(line.to_string()));
        }
    }
}

/// The wizard application.
pub struct App {
    state: AppState,
}

impl App {
    pub fn new(dry_run: bool, save_path: Option<PathBuf>) -> Self {
        let mut state = AppState::new(dry_run, save_path);
        match disks::list_disks() {
            Ok(found) => {
                if found.is_empty() {
                    state.status_message = "No disks found".to_string();
                }
                state.disks = found;
            }
            Err(e) => {
                warn!("disk enumeration failed: {e}");
                state.status_message = format!("Failed to list disks: {e}");
            }
        }
        Self { state }
    }

    /// Run the event loop until the user quits.
    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.drain_install_events();
            terminal.draw(|frame| crate::ui::draw(frame, &self.state))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pull pending worker events into the log. Collected first so the
    /// receiver borrow ends before the state is mutated.
    fn drain_install_events(&mut self) {
        let mut events = Vec::new();
        if let Some(rx) = &self.state.install_rx {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        for event in events {
            match event {
                InstallEvent::Line(line) => self.state.log.push(line),
                InstallEvent::Finished(result) => {
                    self.state.log.push("--- Process Finished ---".to_string());
                    self.state.status_message = match &result {
                        Ok(()) => "Installation finished. Press q to quit.".to_string(),
                        Err(e) => format!("Installation failed: {e}"),
                    };
                    self.state.install_result = Some(result);
                }
            }
        }
    }

    /// Handle one key press. Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.state.screen {
            Screen::DiskSelect => self.handle_disk_select(key),
            Screen::PartitionSelect => self.handle_partition_select(key),
            Screen::SystemConfig => self.handle_system_config(key),
            Screen::Packages => self.handle_packages(key),
            Screen::Summary => self.handle_summary(key),
            Screen::Installing => self.handle_installing(key),
        }
    }

    fn handle_disk_select(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.state.disk_cursor = self.state.disk_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.state.disk_cursor + 1 < self.state.disks.len() {
                    self.state.disk_cursor += 1;
                }
            }
            KeyCode::Enter => self.select_disk(),
            KeyCode::Char('q') | KeyCode::Esc => return true,
            _ => {}
        }
        false
    }

    fn select_disk(&mut self) {
        let Some(disk) = self.state.disks.get(self.state.disk_cursor) else {
            return;
        };
        let disk_path = disk.path.clone();
        match disks::list_partitions(&disk_path) {
            Ok(partitions) if partitions.len() >= 3 => {
                self.state.partitions = partitions;
                // Default to the first three partitions: seed, sprout, EFI.
                self.state.partition_selection = [0, 1, 2];
                self.state.partition_field = PART_FIELD_SEED;
                self.state.selected_disk = Some(disk_path);
                self.state.screen = Screen::PartitionSelect;
                self.state.status_message.clear();
            }
            Ok(partitions) => {
                self.state.status_message = format!(
                    "{disk_path} has {} partitions; seed/sprout/EFI need three",
                    partitions.len()
                );
            }
            Err(e) => {
                self.state.status_message = format!("Failed to list partitions: {e}");
            }
        }
    }

    fn handle_partition_select(&mut self, key: KeyEvent) -> bool {
        let state = &mut self.state;
        match key.code {
            KeyCode::Up | KeyCode::BackTab => {
                state.partition_field = state.partition_field.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Tab => {
                if state.partition_field < PART_FIELD_FORMAT_EFI {
                    state.partition_field += 1;
                }
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
                if state.partition_field == PART_FIELD_FORMAT_EFI =>
            {
                state.format_efi = !state.format_efi;
            }
            KeyCode::Left => {
                let count = state.partitions.len();
                if count > 0 {
                    let selection = &mut state.partition_selection[state.partition_field];
                    *selection = (*selection + count - 1) % count;
                }
            }
            KeyCode::Right => {
                let count = state.partitions.len();
                if count > 0 {
                    let selection = &mut state.partition_selection[state.partition_field];
                    *selection = (*selection + 1) % count;
                }
            }
            KeyCode::Enter => {
                if state.partition_field < PART_FIELD_FORMAT_EFI {
                    state.partition_field += 1;
                } else {
                    state.screen = Screen::SystemConfig;
                    state.status_message.clear();
                }
            }
            KeyCode::Esc => {
                state.screen = Screen::DiskSelect;
            }
            _ => {}
        }
        false
    }

    fn handle_system_config(&mut self, key: KeyEvent) -> bool {
        let state = &mut self.state;
        match key.code {
            KeyCode::Char(c) => {
                state.form_fields[state.form_focus].value.push(c);
            }
            KeyCode::Backspace => {
                state.form_fields[state.form_focus].value.pop();
            }
            KeyCode::Up | KeyCode::BackTab => {
                state.form_focus = state.form_focus.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Tab => {
                if state.form_focus + 1 < state.form_fields.len() {
                    state.form_focus += 1;
                }
            }
            KeyCode::Enter => {
                if state.form_focus < FIELD_USER_CONFIRM {
                    state.form_focus += 1;
                } else {
                    match state.check_passwords() {
                        Ok(()) => {
                            state.screen = Screen::Packages;
                            state.status_message.clear();
                        }
                        Err(message) => state.status_message = message.to_string(),
                    }
                }
            }
            KeyCode::Esc => {
                state.screen = Screen::PartitionSelect;
            }
            _ => {}
        }
        false
    }

    fn handle_packages(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c) => self.state.packages_input.push(c),
            KeyCode::Backspace => {
                self.state.packages_input.pop();
            }
            KeyCode::Enter => {
                self.state.config = Some(self.state.build_config());
                self.state.screen = Screen::Summary;
                self.state.status_message.clear();
            }
            KeyCode::Esc => {
                self.state.screen = Screen::SystemConfig;
            }
            _ => {}
        }
        false
    }

    fn handle_summary(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter | KeyCode::Char('i') => self.start_install(),
            KeyCode::Esc => {
                self.state.screen = Screen::Packages;
            }
            KeyCode::Char('q') => return true,
            _ => {}
        }
        false
    }

    fn handle_installing(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => self.state.log_scroll += 1,
            KeyCode::Down => self.state.log_scroll = self.state.log_scroll.saturating_sub(1),
            KeyCode::PageUp => self.state.log_scroll += 10,
            KeyCode::PageDown => self.state.log_scroll = self.state.log_scroll.saturating_sub(10),
            KeyCode::End => self.state.log_scroll = 0,
            KeyCode::Char('q') | KeyCode::Enter | KeyCode::Esc => {
                if self.state.install_result.is_some() {
                    return true;
                }
                // A started run always proceeds to a terminal state.
                self.state.status_message =
                    "Installation cannot be cancelled once started".to_string();
            }
            _ => {}
        }
        false
    }

    /// Validate the assembled configuration and hand it to a worker thread.
    fn start_install(&mut self) {
        let Some(config) = self.state.config.clone() else {
            return;
        };
        if let Err(e) = config.validate() {
            self.state.status_message = e.to_string();
            return;
        }

        if let Some(path) = &self.state.save_path {
            match config.save_to_file(path) {
                Ok(()) => info!(path = ?path, "configuration saved"),
                Err(e) => {
                    self.state.status_message = format!("Failed to save configuration: {e}");
                    return;
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        self.state.install_rx = Some(rx);
        spawn_install_worker(config, tx);
        self.state.screen = Screen::Installing;
        self.state.status_message.clear();
    }
}

/// Run the orchestrator on a dedicated worker thread, delivering every sink
/// line (and finally the result) through the channel.
fn spawn_install_worker(config: InstallConfig, tx: Sender<InstallEvent>) {
    thread::spawn(move || {
        let sink = EventSink::new(tx.clone());
        let runner = Runner::with_dry_run(config.dry_run);
        let result = Installer::new(&config, &runner, &sink).run();
        let _ = tx.send(InstallEvent::Finished(result.map_err(|e| e.to_string())));
    });
}
