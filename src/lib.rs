//! Seedling installer library
//!
//! Core functionality for provisioning seed/sprout dual-root Arch Linux
//! systems: a read-only seed btrfs filesystem and a writable sprout overlay
//! sharing one subvolume tree, plus an EFI boot partition.

pub mod app;
pub mod chroot;
pub mod cli;
pub mod config;
pub mod disks;
pub mod error;
pub mod exec;
pub mod installer;
pub mod mount;
pub mod phase;
pub mod sink;
pub mod ui;

// Re-export main types for convenience
pub use config::{InstallConfig, DEFAULT_BOOTLOADER_ID, DEFAULT_PACKAGES};
pub use error::{InstallerError, Result};
pub use exec::{CommandHost, CommandOutcome, CommandSpec, ExecMode, Runner};
pub use installer::{Installer, MOUNT_POINT, SIMULATED_PARTUUID};
pub use phase::{InstallPhase, PhaseTracker};
pub use sink::{CollectSink, LogSink, StdoutSink};
