//! Property-based tests
//!
//! Uses proptest for invariants that hold over generated inputs:
//! - The kernel-parameter rewrite is idempotent and never duplicates
//! - Device/hostname validation accepts and rejects whole input classes
//! - Command display is lossless for argument vectors

use proptest::prelude::*;
use seedling::{CommandSpec, InstallConfig};

/// Mirror of the in-chroot sed expression
/// `s/root=UUID=[A-Fa-f0-9-]*/root=PARTUUID=<id>/g`.
fn apply_root_param_rewrite(text: &str, partuuid: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(pos) = rest.find("root=UUID=") {
        out.push_str(&rest[..pos]);
        out.push_str(&format!("root=PARTUUID={partuuid}"));
        rest = &rest[pos + "root=UUID=".len()..];
        let end = rest
            .find(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
            .unwrap_or(rest.len());
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn partuuid_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex(
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .expect("valid regex")
}

fn uuid_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex(
        "[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
    )
    .expect("valid regex")
}

proptest! {
    /// Applying the rewrite twice yields the same text as applying it once,
    /// with exactly one PARTUUID reference per original UUID reference.
    #[test]
    fn root_param_rewrite_is_idempotent(
        partuuid in partuuid_strategy(),
        uuid in uuid_strategy(),
        entries in 1usize..4,
    ) {
        let mut grub_cfg = String::new();
        for i in 0..entries {
            grub_cfg.push_str(&format!(
                "menuentry 'Arch {i}' {{\n  linux /vmlinuz-linux root=UUID={uuid} rw quiet\n}}\n"
            ));
        }

        let once = apply_root_param_rewrite(&grub_cfg, &partuuid);
        let twice = apply_root_param_rewrite(&once, &partuuid);

        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.contains("root=UUID="));
        prop_assert_eq!(once.matches("root=PARTUUID=").count(), entries);
    }

    /// Texts without a root=UUID= parameter pass through unchanged.
    #[test]
    fn root_param_rewrite_leaves_other_text_alone(
        partuuid in partuuid_strategy(),
        text in "[a-zA-Z0-9 =/._-]{0,120}",
    ) {
        prop_assume!(!text.contains("root=UUID="));
        prop_assert_eq!(apply_root_param_rewrite(&text, &partuuid), text);
    }

    /// Hostnames made of letters then alphanumerics always validate.
    #[test]
    fn well_formed_hostnames_validate(hostname in "[a-z][a-z0-9-]{0,30}") {
        let mut config = valid_config();
        config.hostname = hostname;
        prop_assert!(config.validate().is_ok());
    }

    /// Hostnames starting with a digit never validate.
    #[test]
    fn digit_led_hostnames_rejected(hostname in "[0-9][a-z0-9]{0,30}") {
        let mut config = valid_config();
        config.hostname = hostname;
        prop_assert!(config.validate().is_err());
    }

    /// Whole-disk device paths (no trailing digit) never validate.
    #[test]
    fn whole_disk_devices_rejected(tail in "[a-z]{1,8}") {
        let mut config = valid_config();
        config.seed_device = format!("/dev/{tail}");
        prop_assert!(config.validate().is_err());
    }

    /// Argument-vector display joins parts with single spaces, losslessly
    /// for space-free arguments.
    #[test]
    fn argv_display_roundtrip(parts in prop::collection::vec("[a-zA-Z0-9/=_.-]{1,12}", 1..6)) {
        let spec = CommandSpec::argv(parts.clone());
        prop_assert_eq!(spec.to_string(), parts.join(" "));
    }
}

fn valid_config() -> InstallConfig {
    InstallConfig {
        seed_device: "/dev/vda1".to_string(),
        sprout_device: "/dev/vda2".to_string(),
        efi_device: "/dev/vda3".to_string(),
        hostname: "seedbox".to_string(),
        username: "gardener".to_string(),
        timezone: "Europe/Helsinki".to_string(),
        root_password: "rootpw".to_string(),
        user_password: "userpw".to_string(),
        packages: vec!["base".to_string()],
        dry_run: true,
        format_efi: true,
        bootloader_id: "GRUB".to_string(),
    }
}
