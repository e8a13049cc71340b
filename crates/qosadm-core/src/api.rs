//! Boundary contract consumed by presentation layers.
//!
//! Every operation returns the uniform [`ApiResult`] shape — success flag,
//! optional payload, optional error and warning strings — and nothing
//! panics or propagates past this boundary. The presentation layer (CLI
//! here, any toolkit elsewhere) renders these as-is and drives the
//! operations in response to user actions; it holds no policy logic.
//!
//! Registry writes are deliberately not gated on elevation: per-user
//! (`HKCU`) declarations are writable from an ordinary session, and
//! machine-wide writes fail with the backend's own access error. Callers
//! that want to warn up-front use [`QosApi::check_admin`]. Active-policy
//! provisioning *is* gated — the management surface requires an elevated
//! session for every store.

use serde::Serialize;

use crate::error::QosError;
use crate::policy::{enumerate, writer, PolicyPatch, PolicyRecord};
use crate::provision::{self, ActivePolicyForm};
use crate::registry::selector::BackendSelector;
use crate::registry::{Hive, RegView};

const POLICY_EDITOR: &str = "mmc";
const POLICY_EDITOR_SNAPIN: &str = "gpedit.msc";

/// Uniform result shape crossing the presentation boundary.
#[derive(Debug, Serialize)]
pub struct ApiResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> ApiResult<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warning: None,
        }
    }

    fn ok_with_warning(data: T, warning: Option<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warning,
        }
    }

    fn err(err: &QosError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            warning: None,
        }
    }

    fn from_result(result: Result<T, QosError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}

/// The core's entry point: owns the one-time backend selection and exposes
/// every operation the presentation layer needs.
#[derive(Debug)]
pub struct QosApi {
    selector: BackendSelector,
}

impl Default for QosApi {
    fn default() -> Self {
        Self::new()
    }
}

impl QosApi {
    /// Construct with the backend probed once at startup.
    #[must_use]
    pub fn new() -> Self {
        Self {
            selector: BackendSelector::detect(),
        }
    }

    /// Construct over an injected selector (tests, embedding).
    #[must_use]
    pub fn with_selector(selector: BackendSelector) -> Self {
        Self { selector }
    }

    /// Snapshot every declared rule across all four (hive, view)
    /// locations. Always succeeds; partial failures shrink the listing.
    pub fn list_policies(&self) -> ApiResult<Vec<PolicyRecord>> {
        ApiResult::ok(enumerate::collect_all(&self.selector))
    }

    /// Create a rule or update the named fields of an existing one.
    pub fn create_or_update_policy(&self, patch: &PolicyPatch) -> ApiResult<()> {
        ApiResult::from_result(writer::create_or_update(&self.selector, patch))
    }

    /// Delete one rule from one (hive, view) location. Deleting a rule
    /// that does not exist succeeds.
    pub fn delete_policy(&self, rule: &str, hive: Hive, view: RegView) -> ApiResult<bool> {
        ApiResult::from_result(writer::delete(&self.selector, rule, hive, view))
    }

    /// Best-effort removal of a rule's declarations from all four
    /// locations.
    pub fn delete_policy_everywhere(&self, rule: &str) -> ApiResult<()> {
        let trimmed = rule.trim();
        if trimmed.is_empty() {
            return ApiResult::err(&QosError::blank_rule_name());
        }
        writer::clean_all_locations(&self.selector, trimmed);
        ApiResult::ok(())
    }

    /// Report whether the process is elevated. Never fails; the probe's
    /// own failures read as `false`.
    pub fn check_admin(&self) -> ApiResult<bool> {
        ApiResult::ok(crate::privilege::is_elevated())
    }

    /// Create an active NetQos policy from the form.
    pub fn provision_active_policy(&self, form: &ActivePolicyForm) -> ApiResult<String> {
        ApiResult::from_result(provision::provision(form).map(|outcome| outcome.transcript))
    }

    /// Remove an active policy from every store scope, then clean up its
    /// registry declarations. May succeed with a warning when the policy
    /// is re-imposed by a domain-level source.
    pub fn retire_active_policy(&self, name: &str) -> ApiResult<String> {
        match provision::retire(&self.selector, name) {
            Ok(outcome) => ApiResult::ok_with_warning(outcome.transcript, outcome.warning),
            Err(err) => ApiResult::err(&err),
        }
    }

    /// Read one active policy back from one store.
    pub fn show_active_policy(&self, name: &str, store: Option<&str>) -> ApiResult<String> {
        ApiResult::from_result(provision::show(name, store))
    }

    /// Launch the Group Policy editor, fire-and-forget: the process is
    /// spawned and not awaited, and its output is never parsed.
    pub fn launch_policy_editor(&self) -> ApiResult<()> {
        let result = std::process::Command::new(POLICY_EDITOR)
            .arg(POLICY_EDITOR_SNAPIN)
            .spawn()
            .map(drop)
            .map_err(|source| QosError::CommandSpawn {
                tool: POLICY_EDITOR,
                source,
            });
        ApiResult::from_result(result)
    }
}
