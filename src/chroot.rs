//! Chroot configuration script builder
//!
//! Assembles the fixed, ordered list of commands that configure the installed
//! system from inside `arch-chroot`. The builder executes nothing; the
//! orchestrator runs the joined script as a single chrooted bash invocation
//! so every step shares chroot context and fails together under one check.
//!
//! # Security: password handling
//!
//! Passwords are delivered to `chpasswd` through the `ROOT_PASSWORD` and
//! `USER_PASSWORD` environment variables attached to the chroot invocation.
//! They never appear in the script text, the process argument vector, or any
//! sink line.

use crate::config::InstallConfig;
use crate::exec::CommandSpec;

/// mkinitcpio hook list for a btrfs root. `block` and `btrfs` are the ones
/// the stock list lacks; without them the initramfs cannot assemble the
/// multi-device seed/sprout filesystem at boot.
pub const MKINITCPIO_HOOKS: &str =
    "base udev autodetect microcode modconf kms keyboard block btrfs filesystems";

/// Environment variable carrying the root password into the chroot.
pub const ROOT_PASSWORD_ENV: &str = "ROOT_PASSWORD";

/// Environment variable carrying the user password into the chroot.
pub const USER_PASSWORD_ENV: &str = "USER_PASSWORD";

/// Build the in-chroot configuration script.
///
/// The order is fixed: identity and locale first, then accounts, then the
/// bootloader, and the initramfs rebuild last so it sees the final
/// mkinitcpio configuration. `sprout_partuuid` pins the kernel's `root=`
/// parameter to the sprout partition - the system must boot from the sprout
/// device's identity, not the seed's, even though the sprout filesystem was
/// cloned from the seed.
pub fn build_chroot_script(config: &InstallConfig, sprout_partuuid: &str) -> Vec<String> {
    let user = &config.username;
    let grub_options = format!(
        "--target=x86_64-efi --efi-directory=/efi --boot-directory=/boot --bootloader-id={}",
        config.bootloader_id
    );

    vec![
        "hwclock --systohc".to_string(),
        format!("echo '{}' > /etc/hostname", config.hostname),
        "echo 'KEYMAP=us' > /etc/vconsole.conf".to_string(),
        "sed -i 's/^#en_US.UTF-8 UTF-8/en_US.UTF-8 UTF-8/' /etc/locale.gen".to_string(),
        "locale-gen".to_string(),
        "echo 'LANG=en_US.UTF-8' > /etc/locale.conf".to_string(),
        format!("ln -sf /usr/share/zoneinfo/{} /etc/localtime", config.timezone),
        format!("sed -i \"s/^HOOKS=.*/HOOKS=({MKINITCPIO_HOOKS})/\" /etc/mkinitcpio.conf"),
        format!("echo \"root:${ROOT_PASSWORD_ENV}\" | chpasswd"),
        format!("useradd -m -G wheel -s /usr/bin/bash {user}"),
        format!("echo \"{user}:${USER_PASSWORD_ENV}\" | chpasswd"),
        format!("echo '{user} ALL=(ALL:ALL) ALL' > /etc/sudoers.d/{user}"),
        "systemctl enable systemd-timesyncd".to_string(),
        format!("grub-install {grub_options}"),
        "echo 'GRUB_DISABLE_OS_PROBER=false' >> /etc/default/grub".to_string(),
        "grub-mkconfig -o /boot/grub/grub.cfg".to_string(),
        root_param_rewrite(sprout_partuuid),
        "passwd -l root".to_string(),
        "mkinitcpio -P".to_string(),
    ]
}

/// The sed rewrite pinning `root=UUID=...` kernel parameters in the generated
/// grub.cfg to `root=PARTUUID=<sprout>`. Idempotent: once rewritten there is
/// no `root=UUID=` left to match, so a second application changes nothing.
fn root_param_rewrite(sprout_partuuid: &str) -> String {
    format!(
        "sed -i 's/root=UUID=[A-Fa-f0-9-]*/root=PARTUUID={sprout_partuuid}/g' /boot/grub/grub.cfg"
    )
}

/// The single chrooted invocation executing `script`, with passwords attached
/// as environment variables and a display override so sink lines never carry
/// the script body.
pub fn chroot_invocation(config: &InstallConfig, script: &[String]) -> CommandSpec {
    let script_text = script.join("\n");
    CommandSpec::argv([
        "arch-chroot",
        "/mnt",
        "/usr/bin/bash",
        "-c",
        script_text.as_str(),
    ])
    .env(ROOT_PASSWORD_ENV, config.root_password.as_str())
    .env(USER_PASSWORD_ENV, config.user_password.as_str())
    .display_as("arch-chroot /mnt /usr/bin/bash -c <system configuration script>")
}
