//! Elevation probe.
//!
//! One contract for every caller: [`is_elevated`] never panics and fails
//! closed — any probe error, timeout, or ambiguity reads as "not
//! elevated". Two probes run in order: a low-risk native write-open of a
//! protected key (Windows builds), then the `net session` exit-status
//! check, which succeeds only in an administrator session.

use std::process::Command;
use std::time::Duration;

use crate::exec::run_bounded;

const NET_SESSION_TIMEOUT: Duration = Duration::from_secs(15);

/// Whether the current process can perform administrative writes.
#[must_use]
pub fn is_elevated() -> bool {
    #[cfg(windows)]
    if native_write_probe() {
        return true;
    }
    net_session_probe()
}

/// Attempt to open `HKLM\SOFTWARE` for write: allowed only to elevated
/// processes, and side-effect free.
#[cfg(windows)]
fn native_write_probe() -> bool {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE};
    use winreg::RegKey;

    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags("SOFTWARE", KEY_READ | KEY_WRITE)
        .is_ok()
}

/// `net session` exits zero only in an elevated session.
fn net_session_probe() -> bool {
    let mut cmd = Command::new("net");
    cmd.arg("session");
    match run_bounded(cmd, "net", NET_SESSION_TIMEOUT) {
        Ok(out) => out.success,
        Err(_) => false,
    }
}
