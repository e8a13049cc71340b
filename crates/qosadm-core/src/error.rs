//! Unified error taxonomy for registry and provisioning operations.
//!
//! Every fallible operation in this crate reports a [`QosError`]. Absence is
//! not an error: missing keys read as empty results and deletes of missing
//! keys succeed, so no variant here models "not found during a read". The
//! [`QosError::NotFound`] variant exists only for operations whose target is
//! named explicitly and required (e.g. showing a single active policy).

use thiserror::Error;

/// Errors surfaced by the registry backends, the policy writer, and the
/// external policy provisioner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QosError {
    /// A required input field is missing or blank.
    #[error("validation failed: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// The elevation probe failed before a write, delete, or provision
    /// attempt. Fail-closed: any ambiguity in the probe reads as denied.
    #[error("administrator privileges are required for {operation}")]
    PermissionDenied {
        /// The operation that was refused.
        operation: &'static str,
    },

    /// A named target was required but absent.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing target.
        what: String,
    },

    /// A native or shell registry call failed for a reason other than
    /// absence (access denied mid-operation, malformed output, I/O failure).
    #[error("registry backend failure during {op} on {key}: {detail}")]
    Backend {
        /// The registry operation that failed.
        op: &'static str,
        /// The fully-qualified key path involved.
        key: String,
        /// Backend-specific failure detail.
        detail: String,
    },

    /// An external command could not be started.
    #[error("failed to run {tool}: {source}")]
    CommandSpawn {
        /// The external tool that was invoked.
        tool: &'static str,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// An external command ran but reported failure.
    #[error("{tool} failed: {detail}")]
    CommandFailed {
        /// The external tool that was invoked.
        tool: &'static str,
        /// Trimmed stderr, or a description when stderr was empty.
        detail: String,
    },

    /// An external command exceeded its fixed time budget. Never retried.
    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout {
        /// The external tool that was invoked.
        tool: &'static str,
        /// The budget that was exceeded.
        timeout_secs: u64,
    },
}

impl QosError {
    /// Construct a [`QosError::Validation`] for a blank rule name.
    #[must_use]
    pub fn blank_rule_name() -> Self {
        Self::Validation {
            reason: "rule name must not be empty".to_string(),
        }
    }
}
