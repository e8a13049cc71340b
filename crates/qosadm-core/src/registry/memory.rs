//! In-memory [`RegistryBackend`] double for enumerator/writer/api tests.
//!
//! Mirrors the shared backend contract: absent locations list empty, reads
//! of missing rules are `None`, deletes of missing rules are `Ok(false)`.
//! Individual locations can be poisoned to exercise the partial-failure
//! paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::error::QosError;
use crate::policy::PolicyRecord;
use crate::registry::{root_key_path, rule_key_path, Hive, RegView, RegistryBackend};

type Location = (Hive, RegView);
type Values = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct State {
    rules: BTreeMap<Location, BTreeMap<String, Values>>,
    poisoned: BTreeSet<Location>,
    poisoned_values: BTreeSet<String>,
}

/// Shared-state fake registry.
#[derive(Debug, Default)]
pub(crate) struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one rule with the given value names.
    pub fn insert_rule(&self, hive: Hive, view: RegView, rule: &str, values: &[(&str, &str)]) {
        let mut state = self.state.lock().expect("memory backend lock");
        let entry = state
            .rules
            .entry((hive, view))
            .or_default()
            .entry(rule.to_string())
            .or_default();
        for (name, value) in values {
            entry.insert((*name).to_string(), (*value).to_string());
        }
    }

    /// Make every operation against (hive, view) fail with a backend error.
    pub fn poison(&self, hive: Hive, view: RegView) {
        self.state
            .lock()
            .expect("memory backend lock")
            .poisoned
            .insert((hive, view));
    }

    /// Make writes of one specific value name fail, for mid-sequence
    /// failure tests.
    pub fn poison_value(&self, value_name: &str) {
        self.state
            .lock()
            .expect("memory backend lock")
            .poisoned_values
            .insert(value_name.to_string());
    }

    /// Raw value lookup for assertions.
    pub fn value_of(&self, hive: Hive, view: RegView, rule: &str, name: &str) -> Option<String> {
        let state = self.state.lock().expect("memory backend lock");
        state
            .rules
            .get(&(hive, view))
            .and_then(|rules| rules.get(rule))
            .and_then(|values| values.get(name))
            .cloned()
    }

    fn check_poisoned(&self, state: &State, hive: Hive, view: RegView) -> Result<(), QosError> {
        if state.poisoned.contains(&(hive, view)) {
            return Err(QosError::Backend {
                op: "open",
                key: root_key_path(hive),
                detail: format!("poisoned location {hive}/{view}"),
            });
        }
        Ok(())
    }
}

impl RegistryBackend for MemoryBackend {
    fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError> {
        let state = self.state.lock().expect("memory backend lock");
        self.check_poisoned(&state, hive, view)?;
        Ok(state
            .rules
            .get(&(hive, view))
            .map(|rules| rules.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError> {
        let state = self.state.lock().expect("memory backend lock");
        self.check_poisoned(&state, hive, view)?;
        Ok(state
            .rules
            .get(&(hive, view))
            .and_then(|rules| rules.get(rule))
            .map(|values| PolicyRecord::from_values(hive, view, rule, values)))
    }

    fn write_field(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
        value_name: &str,
        data: &str,
    ) -> Result<(), QosError> {
        let mut state = self.state.lock().expect("memory backend lock");
        if state.poisoned.contains(&(hive, view)) {
            return Err(QosError::Backend {
                op: "write",
                key: rule_key_path(hive, rule),
                detail: format!("poisoned location {hive}/{view}"),
            });
        }
        if state.poisoned_values.contains(value_name) {
            return Err(QosError::Backend {
                op: "write",
                key: rule_key_path(hive, rule),
                detail: format!("poisoned value {value_name}"),
            });
        }
        state
            .rules
            .entry((hive, view))
            .or_default()
            .entry(rule.to_string())
            .or_default()
            .insert(value_name.to_string(), data.to_string());
        Ok(())
    }

    fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError> {
        let mut state = self.state.lock().expect("memory backend lock");
        if state.poisoned.contains(&(hive, view)) {
            return Err(QosError::Backend {
                op: "delete",
                key: rule_key_path(hive, rule),
                detail: format!("poisoned location {hive}/{view}"),
            });
        }
        Ok(state
            .rules
            .get_mut(&(hive, view))
            .is_some_and(|rules| rules.remove(rule).is_some()))
    }
}

// Tests hand a clone to the selector and keep one for assertions.
impl RegistryBackend for std::sync::Arc<MemoryBackend> {
    fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError> {
        self.as_ref().list_rules(hive, view)
    }

    fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError> {
        self.as_ref().read_rule(hive, view, rule)
    }

    fn write_field(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
        value_name: &str,
        data: &str,
    ) -> Result<(), QosError> {
        self.as_ref().write_field(hive, view, rule, value_name, data)
    }

    fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError> {
        self.as_ref().delete_rule(hive, view, rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::VAL_PROTOCOL;

    #[test]
    fn empty_location_lists_empty() {
        let backend = MemoryBackend::new();
        assert!(backend
            .list_rules(Hive::Hklm, RegView::View64)
            .expect("empty list")
            .is_empty());
    }

    #[test]
    fn contract_matches_real_backends() {
        let backend = MemoryBackend::new();
        backend.insert_rule(Hive::Hklm, RegView::View64, "R", &[(VAL_PROTOCOL, "TCP")]);

        let record = backend
            .read_rule(Hive::Hklm, RegView::View64, "R")
            .expect("read")
            .expect("present");
        assert_eq!(record.protocol, "TCP");
        assert_eq!(record.application_name, "");

        // Same name in a different location is a different entity.
        assert!(backend
            .read_rule(Hive::Hklm, RegView::View32, "R")
            .expect("read")
            .is_none());

        assert!(backend.delete_rule(Hive::Hklm, RegView::View64, "R").expect("delete"));
        assert!(!backend.delete_rule(Hive::Hklm, RegView::View64, "R").expect("idempotent"));
    }

    #[test]
    fn poisoned_location_errors() {
        let backend = MemoryBackend::new();
        backend.poison(Hive::Hkcu, RegView::View32);
        assert!(backend.list_rules(Hive::Hkcu, RegView::View32).is_err());
        assert!(backend.list_rules(Hive::Hkcu, RegView::View64).is_ok());
    }
}
