//! Install phase machine
//!
//! An authoritative, Rust-side source of truth for installation progress.
//! Phases are strictly ordered and only progress forward; any phase can fall
//! to `Aborted`, and no phase ever repeats within a run.
//!
//! # Phase Flow
//!
//! ```text
//! Preflight
//!     ↓
//! Format
//!     ↓
//! MountSeed
//!     ↓
//! SubvolumeInit
//!     ↓
//! Pacstrap
//!     ↓
//! FstabGenerate
//!     ↓
//! ChrootConfigure
//!     ↓
//! ConvertSeed
//!     ↓
//! AttachSprout
//!     ↓
//! RemountSprout
//!     ↓
//! MountEfi
//!     ↓
//! FinalFstab
//!     ↓
//! Done
//!
//! (Any phase can transition to Aborted)
//! ```

use std::fmt;
use thiserror::Error;

/// Installation phases in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallPhase {
    /// Verify tools and devices, recover a stale `/mnt` mount
    Preflight = 0,

    /// Write fresh filesystems to the seed, sprout and (optionally) EFI
    /// partitions. This is the first DESTRUCTIVE phase.
    Format = 1,

    /// Mount the seed device at its top-level volume
    MountSeed = 2,

    /// Delete a stale `@` subvolume, create a fresh one, remount onto it
    SubvolumeInit = 3,

    /// Install the base package set into the mounted root
    Pacstrap = 4,

    /// Write the UUID-keyed intermediate fstab
    FstabGenerate = 5,

    /// Configure the installed system inside chroot
    ChrootConfigure = 6,

    /// Toggle the seed read-only and add the sprout device to its filesystem
    ConvertSeed = 7,

    /// Detach `/mnt` so the sprout can take over as mount source
    AttachSprout = 8,

    /// Remount the shared subvolume through the sprout device
    RemountSprout = 9,

    /// Mount the EFI partition into the final tree
    MountEfi = 10,

    /// Write the PARTUUID-keyed final fstab
    FinalFstab = 11,

    /// Installation completed successfully (terminal state)
    Done = 12,

    /// Installation aborted (terminal state)
    Aborted = 255,
}

impl InstallPhase {
    /// Returns the numeric order of this phase (0-12, 255 for Aborted)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a terminal state (Done or Aborted)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if this phase mutates devices
    #[inline]
    pub const fn is_destructive(self) -> bool {
        !matches!(self, Self::Preflight | Self::Done | Self::Aborted)
    }

    /// Returns the next phase in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Preflight => Some(Self::Format),
            Self::Format => Some(Self::MountSeed),
            Self::MountSeed => Some(Self::SubvolumeInit),
            Self::SubvolumeInit => Some(Self::Pacstrap),
            Self::Pacstrap => Some(Self::FstabGenerate),
            Self::FstabGenerate => Some(Self::ChrootConfigure),
            Self::ChrootConfigure => Some(Self::ConvertSeed),
            Self::ConvertSeed => Some(Self::AttachSprout),
            Self::AttachSprout => Some(Self::RemountSprout),
            Self::RemountSprout => Some(Self::MountEfi),
            Self::MountEfi => Some(Self::FinalFstab),
            Self::FinalFstab => Some(Self::Done),
            Self::Done | Self::Aborted => None,
        }
    }

    /// Returns a human-readable description of this phase
    pub const fn description(self) -> &'static str {
        match self {
            Self::Preflight => "Checking environment",
            Self::Format => "Creating filesystems",
            Self::MountSeed => "Mounting seed device",
            Self::SubvolumeInit => "Preparing @ subvolume",
            Self::Pacstrap => "Installing base system",
            Self::FstabGenerate => "Generating fstab",
            Self::ChrootConfigure => "Configuring system",
            Self::ConvertSeed => "Converting seed device",
            Self::AttachSprout => "Detaching installation mount",
            Self::RemountSprout => "Remounting via sprout device",
            Self::MountEfi => "Mounting EFI partition",
            Self::FinalFstab => "Writing final fstab",
            Self::Done => "Installation complete",
            Self::Aborted => "Installation aborted",
        }
    }

    /// Returns all phases in order (excluding Aborted)
    pub const fn all_phases() -> &'static [Self] {
        &[
            Self::Preflight,
            Self::Format,
            Self::MountSeed,
            Self::SubvolumeInit,
            Self::Pacstrap,
            Self::FstabGenerate,
            Self::ChrootConfigure,
            Self::ConvertSeed,
            Self::AttachSprout,
            Self::RemountSprout,
            Self::MountEfi,
            Self::FinalFstab,
            Self::Done,
        ]
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during phase transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// Attempted to advance out of a terminal state
    #[error("cannot advance from terminal state {from}")]
    FromTerminalState { from: InstallPhase },

    /// Attempted to abort a run that already reached a terminal state
    #[error("cannot abort from terminal state {from}")]
    AbortFromTerminalState { from: InstallPhase },
}

/// Tracks the current phase of one installation run.
///
/// Owns the phase and provides validated, forward-only transitions. There is
/// no way to skip a phase or revisit one; a failed run must be restarted from
/// scratch by the caller.
///
/// # Example
///
/// ```
/// use seedling::phase::{InstallPhase, PhaseTracker};
///
/// let mut tracker = PhaseTracker::new();
/// assert_eq!(tracker.current(), InstallPhase::Preflight);
///
/// tracker.advance().unwrap();
/// assert_eq!(tracker.current(), InstallPhase::Format);
/// ```
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    /// Current phase
    current: InstallPhase,

    /// Phase at which the run aborted (if any)
    failed_at: Option<InstallPhase>,

    /// History of entered phases with unix timestamps
    history: Vec<(InstallPhase, u64)>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// Create a tracker positioned at Preflight.
    pub fn new() -> Self {
        Self {
            current: InstallPhase::Preflight,
            failed_at: None,
            history: Vec::with_capacity(InstallPhase::all_phases().len()),
        }
    }

    /// Returns the current phase
    #[inline]
    pub fn current(&self) -> InstallPhase {
        self.current
    }

    /// Returns the phase at which the run aborted, if any
    #[inline]
    pub fn failed_at(&self) -> Option<InstallPhase> {
        self.failed_at
    }

    /// Returns true if the run completed successfully
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == InstallPhase::Done
    }

    /// Returns true if the run aborted
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.current == InstallPhase::Aborted
    }

    /// Returns the history of entered phases as (phase, timestamp) pairs
    pub fn history(&self) -> &[(InstallPhase, u64)] {
        &self.history
    }

    /// Advance to the next phase in sequence.
    ///
    /// # Errors
    ///
    /// `FromTerminalState` if already at Done or Aborted.
    pub fn advance(&mut self) -> Result<InstallPhase, PhaseError> {
        match self.current.next() {
            Some(next) => {
                self.record(next);
                self.current = next;
                Ok(next)
            }
            None => Err(PhaseError::FromTerminalState { from: self.current }),
        }
    }

    /// Mark the run as aborted, recording which phase it failed in.
    ///
    /// # Errors
    ///
    /// `AbortFromTerminalState` if already at Done or Aborted.
    pub fn fail(&mut self) -> Result<(), PhaseError> {
        if self.current.is_terminal() {
            return Err(PhaseError::AbortFromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.record(InstallPhase::Aborted);
        self.current = InstallPhase::Aborted;
        Ok(())
    }

    fn record(&mut self, phase: InstallPhase) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.history.push((phase, timestamp));
    }
}

impl From<PhaseError> for crate::error::InstallerError {
    fn from(err: PhaseError) -> Self {
        crate::error::InstallerError::Phase(err.to_string())
    }
}
