//! Create, update, and delete registry-declared rules.

use tracing::warn;

use crate::error::QosError;
use crate::policy::enumerate::ENUMERATION_ORDER;
use crate::policy::PolicyPatch;
use crate::registry::selector::BackendSelector;
use crate::registry::{Hive, RegView};

/// Create a rule or update an existing one in place.
///
/// Only the fields present in `patch` are written — absent fields keep
/// whatever the registry already holds. Field writes are individual and
/// not transactional: the first failure aborts with the backend's error and
/// already-written fields stay written.
pub fn create_or_update(selector: &BackendSelector, patch: &PolicyPatch) -> Result<(), QosError> {
    let rule = patch.rule.trim();
    if rule.is_empty() {
        return Err(QosError::blank_rule_name());
    }
    let hive = patch.hive.unwrap_or_default();
    let view = patch.view.unwrap_or_default();

    for (value_name, value) in patch.field_entries() {
        if let Some(value) = value {
            selector.write_field(hive, view, rule, value_name, value)?;
        }
    }
    Ok(())
}

/// Delete one rule from one (hive, view) location.
///
/// Returns whether a key actually existed; deleting a rule that is not
/// there is a successful no-op.
pub fn delete(
    selector: &BackendSelector,
    rule: &str,
    hive: Hive,
    view: RegView,
) -> Result<bool, QosError> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(QosError::blank_rule_name());
    }
    selector.delete_rule(hive, view, rule)
}

/// Best-effort removal of a rule from all four (hive, view) locations.
///
/// Used when retiring a rule entirely rather than a single declared
/// location. Per-location failures are logged and suppressed.
pub fn clean_all_locations(selector: &BackendSelector, rule: &str) {
    for (hive, view) in ENUMERATION_ORDER {
        if let Err(err) = selector.delete_rule(hive, view, rule) {
            warn!(%hive, %view, rule = %rule, error = %err, "cleanup delete failed");
        }
    }
}
