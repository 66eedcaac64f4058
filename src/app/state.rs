//! Application state definitions
//!
//! All state for the wizard: the current screen, the data gathered on each
//! screen, and the channel plumbing for a running installation.

use crate::config::{InstallConfig, DEFAULT_PACKAGES};
use crate::disks::{Disk, Partition};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use strum::Display;

/// Wizard screens, in visit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Screen {
    #[strum(serialize = "Select Storage Disk")]
    DiskSelect,
    #[strum(serialize = "Select Partitions")]
    PartitionSelect,
    #[strum(serialize = "System Configuration")]
    SystemConfig,
    #[strum(serialize = "Select Packages")]
    Packages,
    #[strum(serialize = "Configuration Summary")]
    Summary,
    #[strum(serialize = "Installing")]
    Installing,
}

/// Events delivered from the installation worker thread to the UI thread.
/// The observer only ever reads; it never calls back into the installer.
pub enum InstallEvent {
    /// One sink line (narration or streamed command output).
    Line(String),
    /// The run reached a terminal state.
    Finished(Result<(), String>),
}

/// One text input of the configuration form.
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    /// Rendered masked; kept out of every log line.
    pub secret: bool,
}

impl FormField {
    fn new(label: &'static str, value: &str, secret: bool) -> Self {
        Self {
            label,
            value: value.to_string(),
            secret,
        }
    }
}

/// Indices into [`AppState::form_fields`].
pub const FIELD_HOSTNAME: usize = 0;
pub const FIELD_USERNAME: usize = 1;
pub const FIELD_TIMEZONE: usize = 2;
pub const FIELD_ROOT_PASSWORD: usize = 3;
pub const FIELD_ROOT_CONFIRM: usize = 4;
pub const FIELD_USER_PASSWORD: usize = 5;
pub const FIELD_USER_CONFIRM: usize = 6;

/// Partition roles on the partition screen. Index 3 is the format-EFI
/// toggle row.
pub const PART_FIELD_SEED: usize = 0;
pub const PART_FIELD_SPROUT: usize = 1;
pub const PART_FIELD_EFI: usize = 2;
pub const PART_FIELD_FORMAT_EFI: usize = 3;

/// Main application state
pub struct AppState {
    /// Current wizard screen
    pub screen: Screen,
    /// Simulation mode, propagated into the config
    pub dry_run: bool,
    /// Where to save the assembled configuration, if requested
    pub save_path: Option<PathBuf>,
    /// Status line for user feedback (validation errors, hints)
    pub status_message: String,

    /// Disks available for selection
    pub disks: Vec<Disk>,
    pub disk_cursor: usize,
    pub selected_disk: Option<String>,

    /// Partitions of the selected disk
    pub partitions: Vec<Partition>,
    /// Focused row on the partition screen (seed/sprout/efi/format toggle)
    pub partition_field: usize,
    /// Selected partition index per role (seed, sprout, efi)
    pub partition_selection: [usize; 3],
    pub format_efi: bool,

    /// System configuration form
    pub form_fields: Vec<FormField>,
    pub form_focus: usize,

    /// Space-separated package list, prefilled with the default set
    pub packages_input: String,

    /// Configuration assembled at the summary screen
    pub config: Option<InstallConfig>,

    /// Installation log lines received from the worker
    pub log: Vec<String>,
    /// Lines scrolled up from the bottom of the log (0 = follow)
    pub log_scroll: usize,
    /// Receiver side of the worker channel while a run is active
    pub install_rx: Option<Receiver<InstallEvent>>,
    /// Terminal result of the run, once finished
    pub install_result: Option<Result<(), String>>,
}

impl AppState {
    pub fn new(dry_run: bool, save_path: Option<PathBuf>) -> Self {
        let defaults = InstallConfig::default();
        Self {
            screen: Screen::DiskSelect,
            dry_run,
            save_path,
            status_message: String::new(),
            disks: Vec::new(),
            disk_cursor: 0,
            selected_disk: None,
            partitions: Vec::new(),
            partition_field: PART_FIELD_SEED,
            partition_selection: [0, 1, 2],
            format_efi: true,
            form_fields: vec![
                FormField::new("Hostname", &defaults.hostname, false),
                FormField::new("Username", "", false),
                FormField::new("Timezone", &defaults.timezone, false),
                FormField::new("Root password", "", true),
                FormField::new("Root password (confirm)", "", true),
                FormField::new("User password", "", true),
                FormField::new("User password (confirm)", "", true),
            ],
            form_focus: 0,
            packages_input: DEFAULT_PACKAGES.join(" "),
            config: None,
            log: Vec::new(),
            log_scroll: 0,
            install_rx: None,
            install_result: None,
        }
    }

    /// The partition path currently selected for a role, if any.
    pub fn partition_for(&self, role: usize) -> Option<&Partition> {
        self.partitions.get(self.partition_selection[role])
    }

    /// Assemble an [`InstallConfig`] from everything gathered so far.
    pub fn build_config(&self) -> InstallConfig {
        let device = |role: usize| {
            self.partition_for(role)
                .map(|p| p.path.clone())
                .unwrap_or_default()
        };
        let packages: Vec<String> = self
            .packages_input
            .split_whitespace()
            .map(|p| p.to_string())
            .collect();
        let packages = if packages.is_empty() {
            DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect()
        } else {
            packages
        };

        InstallConfig {
            seed_device: device(PART_FIELD_SEED),
            sprout_device: device(PART_FIELD_SPROUT),
            efi_device: device(PART_FIELD_EFI),
            hostname: self.form_fields[FIELD_HOSTNAME].value.trim().to_string(),
            username: self.form_fields[FIELD_USERNAME].value.trim().to_string(),
            timezone: self.form_fields[FIELD_TIMEZONE].value.trim().to_string(),
            root_password: self.form_fields[FIELD_ROOT_PASSWORD].value.clone(),
            user_password: self.form_fields[FIELD_USER_PASSWORD].value.clone(),
            packages,
            dry_run: self.dry_run,
            format_efi: self.format_efi,
            ..InstallConfig::default()
        }
    }

    /// Check that both password pairs match and are non-empty. Returns a
    /// user-facing message on mismatch.
    pub fn check_passwords(&self) -> Result<(), &'static str> {
        let root = &self.form_fields[FIELD_ROOT_PASSWORD].value;
        let root_confirm = &self.form_fields[FIELD_ROOT_CONFIRM].value;
        let user = &self.form_fields[FIELD_USER_PASSWORD].value;
        let user_confirm = &self.form_fields[FIELD_USER_CONFIRM].value;

        if root.is_empty() || user.is_empty() {
            return Err("Passwords cannot be empty");
        }
        if root != root_confirm {
            return Err("Root passwords do not match");
        }
        if user != user_confirm {
            return Err("User passwords do not match");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_state() -> AppState {
        let mut state = AppState::new(true, None);
        state.partitions = vec![
            Partition {
                path: "/dev/vda1".to_string(),
                size: "8G".to_string(),
            },
            Partition {
                path: "/dev/vda2".to_string(),
                size: "8G".to_string(),
            },
            Partition {
                path: "/dev/vda3".to_string(),
                size: "1G".to_string(),
            },
        ];
        state.form_fields[FIELD_USERNAME].value = "gardener".to_string();
        state.form_fields[FIELD_ROOT_PASSWORD].value = "rootpw".to_string();
        state.form_fields[FIELD_ROOT_CONFIRM].value = "rootpw".to_string();
        state.form_fields[FIELD_USER_PASSWORD].value = "userpw".to_string();
        state.form_fields[FIELD_USER_CONFIRM].value = "userpw".to_string();
        state
    }

    #[test]
    fn test_build_config_maps_partition_roles() {
        let state = populated_state();
        let config = state.build_config();
        assert_eq!(config.seed_device, "/dev/vda1");
        assert_eq!(config.sprout_device, "/dev/vda2");
        assert_eq!(config.efi_device, "/dev/vda3");
        assert!(config.dry_run);
        config.validate().expect("wizard output should validate");
    }

    #[test]
    fn test_build_config_empty_package_input_falls_back_to_defaults() {
        let mut state = populated_state();
        state.packages_input = "   ".to_string();
        let config = state.build_config();
        assert_eq!(config.packages.len(), DEFAULT_PACKAGES.len());
    }

    #[test]
    fn test_build_config_preserves_package_order_and_duplicates() {
        let mut state = populated_state();
        state.packages_input = "base linux base".to_string();
        let config = state.build_config();
        assert_eq!(config.packages, vec!["base", "linux", "base"]);
    }

    #[test]
    fn test_check_passwords_mismatch() {
        let mut state = populated_state();
        state.form_fields[FIELD_ROOT_CONFIRM].value = "different".to_string();
        assert_eq!(state.check_passwords(), Err("Root passwords do not match"));
    }

    #[test]
    fn test_check_passwords_empty() {
        let mut state = populated_state();
        state.form_fields[FIELD_USER_PASSWORD].value = String::new();
        state.form_fields[FIELD_USER_CONFIRM].value = String::new();
        assert_eq!(state.check_passwords(), Err("Passwords cannot be empty"));
    }

    #[test]
    fn test_check_passwords_ok() {
        assert!(populated_state().check_passwords().is_ok());
    }
}
