//! Installation configuration
//!
//! One fully-populated [`InstallConfig`] value is built before a run starts
//! (by the TUI wizard or loaded from a JSON file) and passed into the
//! orchestration entry point. It never changes during a run, and there is no
//! process-wide configuration state.

use crate::error::{InstallerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Base package set installed when the user does not edit the list.
pub const DEFAULT_PACKAGES: &[&str] = &[
    "base",
    "linux",
    "linux-firmware",
    "btrfs-progs",
    "nano",
    "sudo",
    "networkmanager",
    "efibootmgr",
    "grub",
    "os-prober",
    "base-devel",
    "git",
];

/// Identifier written to the EFI boot menu unless overridden.
pub const DEFAULT_BOOTLOADER_ID: &str = "GRUB";

const DEFAULT_HOSTNAME: &str = "seedling";
const DEFAULT_TIMEZONE: &str = "Europe/Helsinki";

/// All parameters of one installation run. Created once, immutable during
/// the run.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Partition that becomes the read-only seed filesystem.
    pub seed_device: String,
    /// Partition that becomes the writable sprout overlay.
    pub sprout_device: String,
    /// EFI system partition.
    pub efi_device: String,
    pub hostname: String,
    pub username: String,
    pub timezone: String,
    /// Never logged; delivered to the chroot via environment variables.
    pub root_password: String,
    /// Never logged; delivered to the chroot via environment variables.
    pub user_password: String,
    /// Ordered package list. Duplicates permitted, order preserved.
    pub packages: Vec<String>,
    /// When true the full phase sequence runs without mutating anything.
    #[serde(default)]
    pub dry_run: bool,
    /// When false the existing FAT filesystem on `efi_device` is reused.
    #[serde(default = "default_true")]
    pub format_efi: bool,
    #[serde(default = "default_bootloader_id")]
    pub bootloader_id: String,
}

fn default_true() -> bool {
    true
}

fn default_bootloader_id() -> String {
    DEFAULT_BOOTLOADER_ID.to_string()
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            seed_device: String::new(),
            sprout_device: String::new(),
            efi_device: String::new(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            username: String::new(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            root_password: String::new(),
            user_password: String::new(),
            packages: DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect(),
            dry_run: false,
            format_efi: true,
            bootloader_id: DEFAULT_BOOTLOADER_ID.to_string(),
        }
    }
}

// Passwords must never reach a log line, so Debug is written by hand.
impl fmt::Debug for InstallConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallConfig")
            .field("seed_device", &self.seed_device)
            .field("sprout_device", &self.sprout_device)
            .field("efi_device", &self.efi_device)
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("timezone", &self.timezone)
            .field("root_password", &"<redacted>")
            .field("user_password", &"<redacted>")
            .field("packages", &self.packages)
            .field("dry_run", &self.dry_run)
            .field("format_efi", &self.format_efi)
            .field("bootloader_id", &self.bootloader_id)
            .finish()
    }
}

impl InstallConfig {
    /// Save configuration to a pretty-printed JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| {
            InstallerError::config(format!(
                "failed to write configuration to {:?}: {e}",
                path.as_ref()
            ))
        })?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            InstallerError::config(format!(
                "failed to read configuration from {:?}: {e}",
                path.as_ref()
            ))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Runs before orchestration starts; a run never begins with a malformed
    /// config. Device *existence* is an environment concern checked during
    /// the Preflight phase (and skipped in dry runs) - here we only validate
    /// the shape of each field.
    pub fn validate(&self) -> Result<()> {
        validate_device("seed device", &self.seed_device)?;
        validate_device("sprout device", &self.sprout_device)?;
        validate_device("EFI device", &self.efi_device)?;

        if self.seed_device == self.sprout_device
            || self.seed_device == self.efi_device
            || self.sprout_device == self.efi_device
        {
            return Err(InstallerError::validation(
                "seed, sprout and EFI devices must be three distinct partitions",
            ));
        }

        validate_name("hostname", &self.hostname, 63)?;
        validate_name("username", &self.username, 32)?;
        validate_timezone(&self.timezone)?;

        if self.root_password.is_empty() {
            return Err(InstallerError::validation("root password must be set"));
        }
        if self.user_password.is_empty() {
            return Err(InstallerError::validation("user password must be set"));
        }
        if self.root_password.contains(char::is_whitespace)
            || self.user_password.contains(char::is_whitespace)
        {
            return Err(InstallerError::validation(
                "passwords cannot contain whitespace",
            ));
        }

        if self.packages.is_empty() {
            return Err(InstallerError::validation(
                "package list cannot be empty (the default set is the minimum)",
            ));
        }
        for package in &self.packages {
            if package.is_empty() || package.contains(char::is_whitespace) {
                return Err(InstallerError::validation(format!(
                    "invalid package name {package:?}"
                )));
            }
        }

        if self.bootloader_id.is_empty() || self.bootloader_id.contains(char::is_whitespace) {
            return Err(InstallerError::validation(
                "bootloader id must be a single non-empty word",
            ));
        }

        Ok(())
    }
}

fn validate_device(role: &str, device: &str) -> Result<()> {
    if device.trim().is_empty() {
        return Err(InstallerError::validation(format!("{role} must be selected")));
    }
    if !device.starts_with("/dev/") {
        return Err(InstallerError::validation(format!(
            "{role} {device:?} is not a /dev path"
        )));
    }
    // Whole disks end in a letter (/dev/vda, /dev/sda); partitions carry a
    // trailing number (/dev/vda1, /dev/nvme0n1p2).
    if !device.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(InstallerError::validation(format!(
            "{role} {device:?} looks like a whole disk, not a partition"
        )));
    }
    Ok(())
}

fn validate_name(role: &str, value: &str, max_len: usize) -> Result<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InstallerError::validation(format!("{role} must be set")));
    }
    if value.len() > max_len {
        return Err(InstallerError::validation(format!(
            "{role} must be at most {max_len} characters"
        )));
    }
    let mut chars = value.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(InstallerError::validation(format!(
            "{role} must start with a letter"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(InstallerError::validation(format!(
            "{role} can only contain letters, numbers, hyphens and underscores"
        )));
    }
    Ok(())
}

fn validate_timezone(timezone: &str) -> Result<()> {
    if timezone.is_empty() || timezone.contains(char::is_whitespace) {
        return Err(InstallerError::validation(
            "timezone must be a zoneinfo name like Europe/Helsinki",
        ));
    }
    if timezone.starts_with('/') || timezone.contains("..") {
        return Err(InstallerError::validation(format!(
            "timezone {timezone:?} is not a valid zoneinfo name"
        )));
    }
    // Only consult the zone database when the host actually ships one, so
    // validation behaves the same on non-Linux development machines.
    let zoneinfo = Path::new("/usr/share/zoneinfo");
    if zoneinfo.is_dir() && !zoneinfo.join(timezone).exists() {
        return Err(InstallerError::validation(format!(
            "unknown timezone {timezone:?}"
        )));
    }
    Ok(())
}
