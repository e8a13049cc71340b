//! Bounded PowerShell script execution.
//!
//! Scripts are staged to a temp `.ps1` file and run through
//! `powershell.exe -NoProfile -ExecutionPolicy Bypass -File <path>` under a
//! fixed 60-second budget. The temp file is removed best-effort when the
//! handle drops — on success, failure, and timeout alike — and a cleanup
//! failure never reaches the caller.

use std::io::Write;
use std::process::Command;
use std::time::Duration;

use crate::error::QosError;
use crate::exec::run_bounded;

/// Fixed budget for one script run. Exceeding it is a failure, not a retry.
pub const POWERSHELL_TIMEOUT: Duration = Duration::from_secs(60);

const POWERSHELL: &str = "powershell.exe";

/// Captured result of a script run; a nonzero exit is data, not an error.
#[derive(Debug)]
pub struct ScriptOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    /// Trimmed stderr with a fallback for silent failures.
    #[must_use]
    pub fn stderr_or(&self, fallback: &str) -> String {
        let trimmed = self.stderr.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Stage `script` to a temp file and run it to completion.
pub fn run_script(script: &str) -> Result<ScriptOutput, QosError> {
    let mut file = tempfile::Builder::new()
        .prefix("qos_")
        .suffix(".ps1")
        .tempfile()
        .map_err(|err| QosError::CommandFailed {
            tool: POWERSHELL,
            detail: format!("cannot stage script: {err}"),
        })?;
    file.write_all(script.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|err| QosError::CommandFailed {
            tool: POWERSHELL,
            detail: format!("cannot stage script: {err}"),
        })?;

    let mut cmd = Command::new(POWERSHELL);
    cmd.args(["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"])
        .arg(file.path());

    let out = run_bounded(cmd, POWERSHELL, POWERSHELL_TIMEOUT)?;
    // `file` drops here: best-effort unlink on every path.
    Ok(ScriptOutput {
        success: out.success,
        stdout: out.stdout,
        stderr: out.stderr,
    })
}
