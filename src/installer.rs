//! Installation orchestration
//!
//! Drives one provisioning run through the strictly ordered phase sequence:
//! format the seed/sprout/EFI partitions, build the `@` subvolume, populate
//! the root, configure it in chroot, convert the seed to read-only, attach
//! the sprout device and anchor the boot configuration to its PARTUUID.
//!
//! The orchestrator owns `/mnt` for the duration of a run and always leaves
//! it unmounted on the way out, success or failure. All OS access goes
//! through a [`CommandHost`], all user-visible output through a [`LogSink`];
//! the whole run executes on whichever thread calls [`Installer::run`], which
//! may block freely.

use crate::chroot::{build_chroot_script, chroot_invocation};
use crate::config::InstallConfig;
use crate::error::{InstallerError, Result};
use crate::exec::{CommandHost, CommandSpec, ExecMode};
use crate::mount;
use crate::phase::InstallPhase;
use crate::phase::PhaseTracker;
use crate::sink::LogSink;
use tracing::{debug, info, warn};

/// The exclusive installation mount point. One run at a time owns it.
pub const MOUNT_POINT: &str = "/mnt";

const EFI_MOUNT_POINT: &str = "/mnt/efi";

/// PARTUUID stand-in reported by simulated runs, where blkid never executes.
pub const SIMULATED_PARTUUID: &str = "00000000-0000-0000-0000-000000000000";

/// External tools the orchestrator shells out to. Verified during Preflight
/// so a missing tool aborts before anything destructive happens. `fuser` is
/// deliberately absent: mount recovery degrades gracefully without it.
const REQUIRED_TOOLS: &[&str] = &[
    "lsblk",
    "mkfs.btrfs",
    "mkfs.fat",
    "btrfs",
    "btrfstune",
    "mount",
    "umount",
    "mountpoint",
    "blkid",
    "pacstrap",
    "genfstab",
    "arch-chroot",
];

/// One installation run.
pub struct Installer<'a> {
    config: &'a InstallConfig,
    host: &'a dyn CommandHost,
    sink: &'a dyn LogSink,
    tracker: PhaseTracker,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a InstallConfig, host: &'a dyn CommandHost, sink: &'a dyn LogSink) -> Self {
        Self {
            config,
            host,
            sink,
            tracker: PhaseTracker::new(),
        }
    }

    /// The phase the run is currently in (or ended in).
    pub fn current_phase(&self) -> InstallPhase {
        self.tracker.current()
    }

    /// Run the full installation to a terminal state.
    ///
    /// Fail-fast: the first failing phase aborts the run after narrating the
    /// failure to the sink and detaching `/mnt` best-effort. There is no
    /// per-phase retry; a failed run must be restarted from scratch.
    pub fn run(&mut self) -> Result<()> {
        self.config.validate()?;

        match self.run_phases() {
            Ok(()) => {
                info!(history = ?self.tracker.history(), "installation complete");
                Ok(())
            }
            Err(err) => {
                let phase = self.tracker.current();
                self.sink
                    .line(&format!("FAILED during {}: {err}", phase.description()));
                self.release_mount_point();
                self.tracker.fail()?;
                Err(err)
            }
        }
    }

    fn run_phases(&mut self) -> Result<()> {
        self.enter(InstallPhase::Preflight)?;
        self.preflight()?;

        self.enter(InstallPhase::Format)?;
        self.format_filesystems()?;

        self.enter(InstallPhase::MountSeed)?;
        self.mount_subvol(&self.config.seed_device, "/")?;

        self.enter(InstallPhase::SubvolumeInit)?;
        self.subvolume_init()?;

        self.enter(InstallPhase::Pacstrap)?;
        self.pacstrap()?;

        self.enter(InstallPhase::FstabGenerate)?;
        self.host.run_checked(
            &CommandSpec::shell("genfstab -U /mnt > /mnt/etc/fstab"),
            ExecMode::Capture,
            self.sink,
        )?;

        self.enter(InstallPhase::ChrootConfigure)?;
        self.chroot_configure()?;

        self.enter(InstallPhase::ConvertSeed)?;
        self.convert_seed()?;

        self.enter(InstallPhase::AttachSprout)?;
        self.sink.line("Unmounting and remounting sprout device...");
        self.unmount_mount_point()?;

        self.enter(InstallPhase::RemountSprout)?;
        self.mount_subvol(&self.config.sprout_device, "/@")?;

        self.enter(InstallPhase::MountEfi)?;
        self.sink.line("Mounting EFI partition...");
        self.mount_efi()?;

        self.enter(InstallPhase::FinalFstab)?;
        self.final_fstab()?;

        self.enter(InstallPhase::Done)?;
        Ok(())
    }

    fn enter(&mut self, phase: InstallPhase) -> Result<()> {
        let reached = self.tracker.advance()?;
        if reached != phase {
            return Err(InstallerError::phase(format!(
                "expected to enter {phase:?}, reached {reached:?}"
            )));
        }
        debug!(phase = %reached, "entering phase");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn preflight(&self) -> Result<()> {
        if self.config.dry_run {
            debug!("dry run: skipping tool and device verification");
            return Ok(());
        }

        for tool in REQUIRED_TOOLS.iter().copied() {
            let found = self
                .host
                .run(
                    &CommandSpec::argv(["which", tool]),
                    ExecMode::Capture,
                    self.sink,
                )
                .map(|outcome| outcome.success)
                .unwrap_or(false);
            if !found {
                return Err(InstallerError::MissingDependency {
                    tool: tool.to_string(),
                });
            }
        }

        for device in [
            self.config.seed_device.as_str(),
            self.config.sprout_device.as_str(),
            self.config.efi_device.as_str(),
        ] {
            self.host.run_checked(
                &CommandSpec::argv(["lsblk", "-dno", "NAME", device]),
                ExecMode::Capture,
                self.sink,
            )?;
        }

        // A previous run that died mid-phase can leave /mnt mounted.
        if mount::is_mounted(self.host, MOUNT_POINT, self.sink) {
            self.sink.line("/mnt is already mounted. Unmounting...");
            self.unmount_mount_point()?;
        }
        Ok(())
    }

    fn format_filesystems(&self) -> Result<()> {
        let config = self.config;
        self.host.stream_checked(
            &CommandSpec::argv(["mkfs.btrfs", "-f", "-L", "SEED", config.seed_device.as_str()]),
            self.sink,
        )?;
        self.host.stream_checked(
            &CommandSpec::argv([
                "mkfs.btrfs",
                "-f",
                "-L",
                "SPROUT",
                config.sprout_device.as_str(),
            ]),
            self.sink,
        )?;
        if config.format_efi {
            self.host.stream_checked(
                &CommandSpec::argv([
                    "mkfs.fat",
                    "-F",
                    "32",
                    "-n",
                    "EFI",
                    config.efi_device.as_str(),
                ]),
                self.sink,
            )?;
        } else {
            self.sink.line(&format!(
                "Reusing existing EFI filesystem on {}",
                config.efi_device
            ));
        }
        self.sink.line("Filesystems created successfully.");
        Ok(())
    }

    fn subvolume_init(&self) -> Result<()> {
        let listing = self.host.capture(
            &CommandSpec::argv(["btrfs", "subvolume", "list", MOUNT_POINT]),
            self.sink,
        )?;
        if has_top_level_subvolume(&listing, "@") {
            self.sink
                .line("Deleting stale @ subvolume from a previous run...");
            self.host.run_checked(
                &CommandSpec::argv(["btrfs", "subvolume", "delete", "/mnt/@"]),
                ExecMode::Capture,
                self.sink,
            )?;
        }
        self.host.run_checked(
            &CommandSpec::argv(["btrfs", "subvolume", "create", "/mnt/@"]),
            ExecMode::Capture,
            self.sink,
        )?;
        self.unmount_mount_point()?;
        self.mount_subvol(&self.config.seed_device, "/@")
    }

    fn pacstrap(&self) -> Result<()> {
        let mut parts = vec![
            "pacstrap".to_string(),
            "-K".to_string(),
            MOUNT_POINT.to_string(),
        ];
        parts.extend(self.config.packages.iter().cloned());
        self.host
            .stream_checked(&CommandSpec::argv(parts), self.sink)?;

        // The first fstab must see the ESP, so mount it before genfstab.
        self.mount_efi()
    }

    fn chroot_configure(&self) -> Result<()> {
        let sprout_partuuid = self.sprout_partuuid()?;
        self.sink
            .line(&format!("Sprout PARTUUID: {sprout_partuuid}"));

        let script = build_chroot_script(self.config, &sprout_partuuid);
        self.host
            .stream_checked(&chroot_invocation(self.config, &script), self.sink)
    }

    fn sprout_partuuid(&self) -> Result<String> {
        let spec = CommandSpec::argv([
            "blkid",
            "-s",
            "PARTUUID",
            "-o",
            "value",
            self.config.sprout_device.as_str(),
        ]);
        if self.config.dry_run {
            self.host.capture(&spec, self.sink)?;
            return Ok(SIMULATED_PARTUUID.to_string());
        }
        let partuuid = self.host.capture(&spec, self.sink)?;
        if partuuid.is_empty() {
            return Err(InstallerError::CommandFailed {
                command: spec.to_string(),
                code: 0,
                stderr: format!("no PARTUUID reported for {}", self.config.sprout_device),
            });
        }
        Ok(partuuid)
    }

    fn convert_seed(&self) -> Result<()> {
        let config = self.config;
        self.sink.line("--- Finalizing seed/sprout setup ---");
        self.sink.line("Unmounting /mnt...");
        self.unmount_mount_point()?;

        self.sink.line(&format!(
            "Converting {} to a seed device...",
            config.seed_device
        ));
        self.host.run_checked(
            &CommandSpec::argv(["btrfstune", "-S", "1", config.seed_device.as_str()]),
            ExecMode::Capture,
            self.sink,
        )?;

        self.sink.line("Mounting seed device to add sprout...");
        self.mount_subvol(&config.seed_device, "/@")?;

        self.sink.line(&format!(
            "Adding {} as sprout device...",
            config.sprout_device
        ));
        self.host
            .run_checked(
                &CommandSpec::argv([
                    "btrfs",
                    "device",
                    "add",
                    "-f",
                    config.sprout_device.as_str(),
                    MOUNT_POINT,
                ]),
                ExecMode::Capture,
                self.sink,
            )
            .map(|_| ())
    }

    fn final_fstab(&self) -> Result<()> {
        self.sink.line("Generating final fstab with PARTUUIDs...");
        self.host.run_checked(
            &CommandSpec::shell("genfstab -t PARTUUID /mnt > /mnt/etc/fstab"),
            ExecMode::Capture,
            self.sink,
        )?;

        self.sink.line("");
        self.sink
            .line("################################################################");
        self.sink
            .line("#                   INSTALLATION COMPLETE                      #");
        self.sink
            .line("################################################################");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn mount_subvol(&self, device: &str, subvol: &str) -> Result<()> {
        let options = format!("subvol={subvol}");
        self.host
            .run_checked(
                &CommandSpec::argv(["mount", "-o", options.as_str(), device, MOUNT_POINT]),
                ExecMode::Capture,
                self.sink,
            )
            .map(|_| ())
    }

    fn mount_efi(&self) -> Result<()> {
        self.host
            .run_checked(
                &CommandSpec::argv([
                    "mount",
                    "--mkdir",
                    self.config.efi_device.as_str(),
                    EFI_MOUNT_POINT,
                ]),
                ExecMode::Capture,
                self.sink,
            )
            .map(|_| ())
    }

    /// Escalating unmount of `/mnt`; only fatal when even the lazy unmount
    /// fails.
    fn unmount_mount_point(&self) -> Result<()> {
        if mount::unmount_recursive(self.host, MOUNT_POINT, self.sink) {
            Ok(())
        } else {
            Err(InstallerError::CommandFailed {
                command: format!("umount -R {MOUNT_POINT}"),
                code: -1,
                stderr: "mount point still busy after kill and lazy escalation".to_string(),
            })
        }
    }

    /// Best-effort `/mnt` detach on the failure path. Never masks the
    /// original error.
    fn release_mount_point(&self) {
        if self.config.dry_run {
            return;
        }
        if mount::is_mounted(self.host, MOUNT_POINT, self.sink)
            && !mount::unmount_recursive(self.host, MOUNT_POINT, self.sink)
        {
            warn!("failed to release {MOUNT_POINT} after aborted run");
        }
    }
}

/// True if a `btrfs subvolume list` output names `name` as a top-level
/// subvolume (the final `path` column).
fn has_top_level_subvolume(listing: &str, name: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().last() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_top_level_subvolume_matches_path_column() {
        let listing = "ID 256 gen 7 top level 5 path @\n";
        assert!(has_top_level_subvolume(listing, "@"));
    }

    #[test]
    fn test_has_top_level_subvolume_ignores_other_names() {
        let listing = "ID 256 gen 7 top level 5 path @home\nID 257 gen 9 top level 5 path snap\n";
        assert!(!has_top_level_subvolume(listing, "@"));
    }

    #[test]
    fn test_has_top_level_subvolume_empty_listing() {
        assert!(!has_top_level_subvolume("", "@"));
    }
}
