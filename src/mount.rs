//! Mount recovery
//!
//! Unmounting `/mnt` is the one operation the orchestrator must tolerate
//! failing: daemons spawned during a chroot step (an agent process, a
//! freshly enabled service) often hold the tree busy for a moment after the
//! step returns. Failing immediately would make installations
//! non-reproducible, so recovery escalates instead:
//!
//! 1. Plain recursive unmount.
//! 2. If `fuser` is available, kill every process with an open handle under
//!    the path, wait a short grace period, retry the plain unmount.
//! 3. Recursive lazy unmount as last resort - the mount point detaches
//!    immediately and the device frees once references drop.
//!
//! Each step runs only if the previous failed. A total failure is reported
//! as `false`, never raised; the caller decides whether that is fatal.

use crate::exec::{CommandHost, CommandSpec, ExecMode};
use crate::sink::LogSink;
use std::time::Duration;
use tracing::debug;

/// Grace period between killing handle-holders and retrying the unmount.
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Check whether `path` is currently a mount point.
pub fn is_mounted(host: &dyn CommandHost, path: &str, sink: &dyn LogSink) -> bool {
    host.run(
        &CommandSpec::argv(["mountpoint", "-q", path]),
        ExecMode::Capture,
        sink,
    )
    .map(|outcome| outcome.success)
    .unwrap_or(false)
}

/// Recursively unmount `path`, escalating through kill-and-retry and lazy
/// unmount. Returns `true` once the tree is detached.
pub fn unmount_recursive(host: &dyn CommandHost, path: &str, sink: &dyn LogSink) -> bool {
    if try_unmount(host, path, &[], sink) {
        return true;
    }

    if fuser_available(host, sink) {
        sink.line(&format!(
            "{path} is busy; terminating processes holding it open"
        ));
        let _ = host.run(
            &CommandSpec::argv(["fuser", "-k", "-9", "-m", path]),
            ExecMode::Capture,
            sink,
        );
        std::thread::sleep(KILL_GRACE);
        if try_unmount(host, path, &[], sink) {
            return true;
        }
    }

    sink.line(&format!("falling back to lazy unmount of {path}"));
    try_unmount(host, path, &["-l"], sink)
}

fn try_unmount(host: &dyn CommandHost, path: &str, extra: &[&str], sink: &dyn LogSink) -> bool {
    let mut parts = vec!["umount".to_string(), "-R".to_string()];
    parts.extend(extra.iter().map(|flag| flag.to_string()));
    parts.push(path.to_string());

    let detached = host
        .run(&CommandSpec::argv(parts), ExecMode::Capture, sink)
        .map(|outcome| outcome.success)
        .unwrap_or(false);
    debug!(path, ?extra, detached, "unmount attempt");
    detached
}

fn fuser_available(host: &dyn CommandHost, sink: &dyn LogSink) -> bool {
    host.run(
        &CommandSpec::argv(["which", "fuser"]),
        ExecMode::Capture,
        sink,
    )
    .map(|outcome| outcome.success)
    .unwrap_or(false)
}
