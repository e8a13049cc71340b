//! Bounded execution of external command-line tools.
//!
//! Every shell-delegated call in this crate (reg.exe, powershell.exe,
//! `net session`) goes through [`run_bounded`]: piped stdio drained by
//! dedicated reader threads (a subprocess writing more than the pipe buffer
//! would otherwise deadlock against a plain `wait`), a fixed wall-clock
//! budget enforced with `wait_timeout`, and kill-plus-reap on expiry.
//! Exceeding the budget is an operation failure, never a retry trigger.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::QosError;

/// Maximum bytes read from a tool's stdout before the call is failed.
const MAX_STDOUT_BYTES: usize = 4 * 1024 * 1024;

/// Maximum bytes read from a tool's stderr.
const MAX_STDERR_BYTES: usize = 256 * 1024;

/// Captured result of a bounded tool invocation.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    /// Whether the tool exited with a zero status.
    pub success: bool,
    /// Lossily-decoded stdout.
    pub stdout: String,
    /// Lossily-decoded stderr.
    pub stderr: String,
}

impl ToolOutput {
    /// Trimmed stderr, falling back to a placeholder when the tool said
    /// nothing.
    pub fn stderr_or(&self, fallback: &str) -> String {
        let trimmed = self.stderr.trim();
        if trimmed.is_empty() {
            fallback.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Run `command` to completion within `timeout`.
///
/// Returns [`ToolOutput`] for any exit status (callers decide what a nonzero
/// status means). Errors are reserved for the invocation itself: spawn
/// failure, wait failure, output over the size cap, or the timeout expiring
/// (the child is killed and reaped before [`QosError::Timeout`] is returned).
pub(crate) fn run_bounded(
    mut command: Command,
    tool: &'static str,
    timeout: Duration,
) -> Result<ToolOutput, QosError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|source| QosError::CommandSpawn { tool, source })?;

    let (stdout_tx, stdout_rx) = mpsc::channel();
    let (stderr_tx, stderr_rx) = mpsc::channel();

    let stdout_thread = child.stdout.take().map(|pipe| {
        std::thread::spawn(move || {
            let _ = stdout_tx.send(read_pipe_bounded(pipe, MAX_STDOUT_BYTES));
        })
    });
    let stderr_thread = child.stderr.take().map(|pipe| {
        std::thread::spawn(move || {
            let _ = stderr_tx.send(read_pipe_bounded(pipe, MAX_STDERR_BYTES));
        })
    });

    // Wait first, then join the readers: they complete once the subprocess
    // closes its pipes (either on exit or on kill).
    let status = child
        .wait_timeout(timeout)
        .map_err(|err| QosError::CommandFailed {
            tool,
            detail: format!("failed to wait for {tool}: {err}"),
        })?;

    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        // The reader threads are left to finish on their own once the
        // pipes close: a grandchild holding a dup'd write end must not
        // turn the timeout report into a second hang.
        return Err(QosError::Timeout {
            tool,
            timeout_secs: timeout.as_secs(),
        });
    };

    if let Some(thread) = stdout_thread {
        let _ = thread.join();
    }
    if let Some(thread) = stderr_thread {
        let _ = thread.join();
    }

    let stdout = collect_pipe(&stdout_rx, tool, "stdout")?;
    let stderr = collect_pipe(&stderr_rx, tool, "stderr")?;

    Ok(ToolOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn collect_pipe(
    rx: &mpsc::Receiver<Result<Vec<u8>, String>>,
    tool: &'static str,
    stream: &str,
) -> Result<Vec<u8>, QosError> {
    match rx.try_recv() {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(detail)) => Err(QosError::CommandFailed {
            tool,
            detail: format!("failed to read {stream}: {detail}"),
        }),
        // No reader thread was spawned for this stream.
        Err(_) => Ok(Vec::new()),
    }
}

/// Read at most `limit` bytes from `pipe`; more than `limit` is an error
/// rather than a silent truncation.
fn read_pipe_bounded<R: Read>(pipe: R, limit: usize) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    let mut bounded = pipe.take(limit as u64 + 1);
    bounded
        .read_to_end(&mut bytes)
        .map_err(|err| err.to_string())?;
    if bytes.len() > limit {
        return Err(format!("output exceeds {limit} bytes"));
    }
    Ok(bytes)
}
