//! Four-quadrant policy enumeration.

use tracing::{debug, warn};

use crate::policy::PolicyRecord;
use crate::registry::selector::BackendSelector;
use crate::registry::{Hive, RegView};

/// Traversal order over the (hive, view) product: machine before user,
/// 64-bit before 32-bit. The order is part of the output contract —
/// callers and tests rely on it for deterministic listings.
pub const ENUMERATION_ORDER: [(Hive, RegView); 4] = [
    (Hive::Hklm, RegView::View64),
    (Hive::Hklm, RegView::View32),
    (Hive::Hkcu, RegView::View64),
    (Hive::Hkcu, RegView::View32),
];

/// Read every rule in every (hive, view) location into a fresh snapshot.
///
/// A failure listing one location, or reading one rule, is logged and
/// skipped; it never aborts the rest of the sweep. Total failure yields an
/// empty vector, indistinguishable from a registry with no rules.
#[must_use]
pub fn collect_all(selector: &BackendSelector) -> Vec<PolicyRecord> {
    let mut records = Vec::new();
    for (hive, view) in ENUMERATION_ORDER {
        let names = match selector.list_rules(hive, view) {
            Ok(names) => names,
            Err(err) => {
                warn!(%hive, %view, error = %err, "skipping location: listing failed");
                continue;
            },
        };
        for rule in names {
            match selector.read_rule(hive, view, &rule) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    debug!(%hive, %view, rule = %rule, "rule vanished between list and read");
                },
                Err(err) => {
                    warn!(%hive, %view, rule = %rule, error = %err, "skipping rule: read failed");
                },
            }
        }
    }
    records
}
