//! Tests for installation orchestration
//!
//! These tests verify:
//! - The dry-run transcript contract (ordering, banner, no mutation)
//! - EFI reuse behavior
//! - Stale `@` subvolume handling on re-runs
//! - Fail-fast abort with mount-point cleanup
//! - Preflight dependency checking

mod common;

use common::FakeHost;
use seedling::{
    CollectSink, InstallConfig, InstallPhase, Installer, InstallerError, Runner,
    SIMULATED_PARTUUID,
};

fn test_config(dry_run: bool) -> InstallConfig {
    InstallConfig {
        seed_device: "/dev/vda1".to_string(),
        sprout_device: "/dev/vda2".to_string(),
        efi_device: "/dev/vda3".to_string(),
        hostname: "seedbox".to_string(),
        username: "gardener".to_string(),
        timezone: "Europe/Helsinki".to_string(),
        root_password: "root-secret-pw".to_string(),
        user_password: "user-secret-pw".to_string(),
        packages: vec!["base".to_string(), "linux".to_string()],
        dry_run,
        format_efi: true,
        bootloader_id: "GRUB".to_string(),
    }
}

// =============================================================================
// Dry-run transcript contract
// =============================================================================

#[test]
fn test_dry_run_transcript_order_and_banner() {
    let config = test_config(true);
    let runner = Runner::simulated();
    let sink = CollectSink::new();

    let mut installer = Installer::new(&config, &runner, &sink);
    installer.run().expect("dry run should complete");
    assert_eq!(installer.current_phase(), InstallPhase::Done);

    let lines = sink.lines();
    assert!(!lines.is_empty());

    // The transcript begins with the filesystem-creation lines, in order.
    assert_eq!(
        lines[0],
        "[DRY RUN] Would execute: mkfs.btrfs -f -L SEED /dev/vda1"
    );
    assert_eq!(
        lines[1],
        "[DRY RUN] Would execute: mkfs.btrfs -f -L SPROUT /dev/vda2"
    );
    assert_eq!(
        lines[2],
        "[DRY RUN] Would execute: mkfs.fat -F 32 -n EFI /dev/vda3"
    );

    // ... and ends with the completion banner.
    assert_eq!(
        lines.last().map(String::as_str),
        Some("################################################################")
    );
    assert!(lines
        .iter()
        .any(|l| l.contains("INSTALLATION COMPLETE")));

    // No failure anywhere.
    assert!(!lines.iter().any(|l| l.contains("FAILED")));
}

#[test]
fn test_dry_run_phase_sequence_in_transcript() {
    let config = test_config(true);
    let runner = Runner::simulated();
    let sink = CollectSink::new();
    Installer::new(&config, &runner, &sink)
        .run()
        .expect("dry run should complete");

    let lines = sink.lines();
    let position = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("transcript should contain {needle}"))
    };

    // Format → subvolume init → pacstrap → fstab → chroot → convert →
    // remount via sprout → final fstab.
    assert!(position("mkfs.btrfs -f -L SEED") < position("btrfs subvolume create /mnt/@"));
    assert!(position("btrfs subvolume create /mnt/@") < position("pacstrap -K /mnt base linux"));
    assert!(position("pacstrap") < position("genfstab -U /mnt > /mnt/etc/fstab"));
    assert!(position("genfstab -U") < position("arch-chroot"));
    assert!(position("arch-chroot") < position("btrfstune -S 1 /dev/vda1"));
    assert!(position("btrfstune") < position("btrfs device add -f /dev/vda2 /mnt"));
    assert!(
        position("btrfs device add") < position("mount -o subvol=/@ /dev/vda2 /mnt")
    );
    assert!(position("mount -o subvol=/@ /dev/vda2 /mnt") < position("genfstab -t PARTUUID"));
}

#[test]
fn test_dry_run_reports_simulated_partuuid() {
    let config = test_config(true);
    let runner = Runner::simulated();
    let sink = CollectSink::new();
    Installer::new(&config, &runner, &sink)
        .run()
        .expect("dry run should complete");

    assert!(sink
        .lines()
        .iter()
        .any(|l| l == &format!("Sprout PARTUUID: {SIMULATED_PARTUUID}")));
}

#[test]
fn test_dry_run_never_leaks_passwords() {
    let config = test_config(true);
    let runner = Runner::simulated();
    let sink = CollectSink::new();
    Installer::new(&config, &runner, &sink)
        .run()
        .expect("dry run should complete");

    let lines = sink.lines();
    assert!(!lines.iter().any(|l| l.contains("root-secret-pw")));
    assert!(!lines.iter().any(|l| l.contains("user-secret-pw")));
    // The chroot invocation is narrated through its display override.
    assert!(lines
        .iter()
        .any(|l| l.ends_with("arch-chroot /mnt /usr/bin/bash -c <system configuration script>")));
}

#[test]
fn test_format_efi_false_skips_format_but_mounts() {
    let mut config = test_config(true);
    config.format_efi = false;
    let runner = Runner::simulated();
    let sink = CollectSink::new();
    Installer::new(&config, &runner, &sink)
        .run()
        .expect("dry run should complete");

    let lines = sink.lines();
    assert!(
        !lines.iter().any(|l| l.contains("mkfs.fat")),
        "no format command may be emitted for a reused EFI partition"
    );
    assert!(lines
        .iter()
        .any(|l| l.contains("Reusing existing EFI filesystem on /dev/vda3")));
    assert!(
        lines
            .iter()
            .any(|l| l.contains("mount --mkdir /dev/vda3 /mnt/efi")),
        "the EFI mount step must still run"
    );
}

// =============================================================================
// Subvolume re-run handling
// =============================================================================

#[test]
fn test_stale_subvolume_deleted_before_create() {
    let config = test_config(false);
    let host = FakeHost::new()
        .with_stdout("btrfs subvolume list", "ID 256 gen 7 top level 5 path @\n")
        .with_stdout("blkid", "3f1c9a2e-7b4d-4e5f-8a6b-9c0d1e2f3a4b\n");
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink)
        .run()
        .expect("run should complete");

    let delete = host
        .position("btrfs subvolume delete /mnt/@")
        .expect("stale @ must be deleted");
    let create = host
        .position("btrfs subvolume create /mnt/@")
        .expect("fresh @ must be created");
    assert!(delete < create, "delete must precede create");
    assert_eq!(host.count("btrfs subvolume delete"), 1);
}

#[test]
fn test_fresh_device_skips_subvolume_delete() {
    let config = test_config(false);
    let host = FakeHost::new().with_stdout("blkid", "3f1c9a2e-7b4d-4e5f-8a6b-9c0d1e2f3a4b\n");
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink)
        .run()
        .expect("run should complete");

    assert_eq!(host.count("btrfs subvolume delete"), 0);
    assert_eq!(host.count("btrfs subvolume create /mnt/@"), 1);
}

// =============================================================================
// PARTUUID capture
// =============================================================================

#[test]
fn test_partuuid_read_before_chroot() {
    let config = test_config(false);
    let host = FakeHost::new().with_stdout("blkid", "3f1c9a2e-7b4d-4e5f-8a6b-9c0d1e2f3a4b\n");
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink)
        .run()
        .expect("run should complete");

    let blkid = host.position("blkid").expect("blkid must run");
    let chroot = host.position("arch-chroot").expect("chroot must run");
    assert!(blkid < chroot, "PARTUUID is read before entering chroot");

    assert!(sink
        .lines()
        .iter()
        .any(|l| l == "Sprout PARTUUID: 3f1c9a2e-7b4d-4e5f-8a6b-9c0d1e2f3a4b"));
}

// =============================================================================
// Fail-fast behavior
// =============================================================================

#[test]
fn test_pacstrap_failure_aborts_with_phase_line() {
    let config = test_config(false);
    let host = FakeHost::new().with_failures("pacstrap", u32::MAX);
    let sink = CollectSink::new();

    let mut installer = Installer::new(&config, &host, &sink);
    let err = installer.run().unwrap_err();
    assert!(matches!(err, InstallerError::CommandFailed { .. }));
    assert_eq!(installer.current_phase(), InstallPhase::Aborted);

    let lines = sink.lines();
    let failure_line = lines
        .iter()
        .find(|l| l.starts_with("FAILED during"))
        .expect("a failure line must identify the phase");
    assert!(failure_line.contains("Installing base system"));
    assert!(failure_line.contains("pacstrap"));
}

#[test]
fn test_failure_path_releases_mount_point() {
    let config = test_config(false);
    let host = FakeHost::new().with_failures("pacstrap", u32::MAX);
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink).run().unwrap_err();

    let calls = host.calls();
    let failure = calls
        .iter()
        .position(|c| c.contains("pacstrap"))
        .expect("pacstrap attempted");
    assert!(
        calls[failure..].iter().any(|c| c.contains("umount -R /mnt")),
        "/mnt must be detached after an aborted run"
    );
}

#[test]
fn test_no_steps_run_after_failed_phase() {
    let config = test_config(false);
    let host = FakeHost::new().with_failures("mkfs.btrfs", u32::MAX);
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink).run().unwrap_err();

    // Nothing from later phases may have been attempted.
    assert_eq!(host.count("pacstrap"), 0);
    assert_eq!(host.count("arch-chroot"), 0);
    assert_eq!(host.count("btrfstune"), 0);
}

// =============================================================================
// Preflight
// =============================================================================

#[test]
fn test_missing_dependency_aborts_before_mutation() {
    let config = test_config(false);
    let host = FakeHost::new().with_failures("which pacstrap", u32::MAX);
    let sink = CollectSink::new();

    let err = Installer::new(&config, &host, &sink).run().unwrap_err();
    match err {
        InstallerError::MissingDependency { tool } => assert_eq!(tool, "pacstrap"),
        other => panic!("expected MissingDependency, got {other:?}"),
    }

    // Only `which` probes may have run; nothing destructive.
    assert_eq!(host.count("mkfs.btrfs -f"), 0, "no format command may run");
    assert!(host.calls().iter().all(|c| c.starts_with("which")));
}

#[test]
fn test_preflight_recovers_premounted_mnt() {
    // mountpoint -q succeeding means /mnt is mounted from a previous run.
    let config = test_config(false);
    let host = FakeHost::new().with_stdout("blkid", "3f1c9a2e-7b4d-4e5f-8a6b-9c0d1e2f3a4b\n");
    let sink = CollectSink::new();

    Installer::new(&config, &host, &sink)
        .run()
        .expect("run should complete");

    let recovery_unmount = host.position("umount -R /mnt").expect("recovery unmount");
    let first_format = host.position("mkfs.btrfs").expect("format runs");
    assert!(recovery_unmount < first_format);
    assert!(sink
        .lines()
        .iter()
        .any(|l| l.contains("/mnt is already mounted")));
}

// =============================================================================
// Validation happens before orchestration
// =============================================================================

#[test]
fn test_invalid_config_rejected_before_any_command() {
    let mut config = test_config(false);
    config.sprout_device = config.seed_device.clone();
    let host = FakeHost::new();
    let sink = CollectSink::new();

    let err = Installer::new(&config, &host, &sink).run().unwrap_err();
    assert!(matches!(err, InstallerError::Validation(_)));
    assert!(host.calls().is_empty(), "no command may run");
    assert!(sink.lines().is_empty(), "no narration before a valid run");
}
