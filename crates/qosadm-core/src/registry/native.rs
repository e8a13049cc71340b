//! Native Win32 registry backend (`winreg`).
//!
//! Handle ownership is scoped: every `RegKey` opened here is dropped (and
//! thereby closed) before the operation returns, on success and on every
//! error path. Nothing is cached between calls.

use std::collections::BTreeMap;

use winreg::enums::{
    RegType, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_32KEY, KEY_WOW64_64KEY,
    KEY_WRITE,
};
use winreg::{RegKey, RegValue};

use crate::error::QosError;
use crate::policy::{PolicyRecord, RULE_VALUE_NAMES};
use crate::registry::codec::{self, RawValueKind};
use crate::registry::{
    root_key_path, rule_key_path, Hive, RegView, RegistryBackend, QOS_ROOT_SUBKEY,
};

/// Registry access through the Win32 API.
#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    /// Probe whether the native API is usable at all: a harmless read-only
    /// open of `HKLM\Software`. Used once by the backend selector.
    #[must_use]
    pub fn probe() -> bool {
        RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey_with_flags("Software", KEY_READ)
            .is_ok()
    }

    /// Open the QoS policy root in `hive` under the bitness-redirected
    /// `view`; `Ok(None)` when the root key does not exist.
    fn open_root(hive: Hive, view: RegView, write: bool) -> Result<Option<RegKey>, QosError> {
        let access = if write { KEY_READ | KEY_WRITE } else { KEY_READ };
        match hive_root(hive).open_subkey_with_flags(QOS_ROOT_SUBKEY, access | view_flag(view)) {
            Ok(key) => Ok(Some(key)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(QosError::Backend {
                op: "open",
                key: root_key_path(hive),
                detail: err.to_string(),
            }),
        }
    }
}

impl RegistryBackend for NativeBackend {
    fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError> {
        let Some(root) = Self::open_root(hive, view, false)? else {
            return Ok(Vec::new());
        };
        root.enum_keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| QosError::Backend {
                op: "enumerate",
                key: root_key_path(hive),
                detail: err.to_string(),
            })
    }

    fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError> {
        let Some(root) = Self::open_root(hive, view, false)? else {
            return Ok(None);
        };
        // Any failure to open the rule subkey reads as "no such rule".
        let Ok(key) = root.open_subkey_with_flags(rule, KEY_READ | view_flag(view)) else {
            return Ok(None);
        };

        let mut values = BTreeMap::new();
        for name in RULE_VALUE_NAMES {
            if let Ok(raw) = key.get_raw_value(name) {
                values.insert(
                    (*name).to_string(),
                    codec::decode_to_string(value_kind(raw.vtype), &raw.bytes),
                );
            }
        }
        Ok(Some(PolicyRecord::from_values(hive, view, rule, &values)))
    }

    fn write_field(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
        value_name: &str,
        data: &str,
    ) -> Result<(), QosError> {
        let path = format!("{QOS_ROOT_SUBKEY}\\{rule}");
        let (key, _disposition) = hive_root(hive)
            .create_subkey_with_flags(&path, KEY_READ | KEY_WRITE | view_flag(view))
            .map_err(|err| QosError::Backend {
                op: "create",
                key: rule_key_path(hive, rule),
                detail: err.to_string(),
            })?;

        let raw = RegValue {
            bytes: codec::encode_sz_bytes(data),
            vtype: RegType::REG_SZ,
        };
        key.set_raw_value(value_name, &raw)
            .map_err(|err| QosError::Backend {
                op: "write",
                key: rule_key_path(hive, rule),
                detail: format!("{value_name}: {err}"),
            })
    }

    fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError> {
        let Some(root) = Self::open_root(hive, view, true)? else {
            return Ok(false);
        };
        match root.delete_subkey_with_flags(rule, view_flag(view)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(QosError::Backend {
                op: "delete",
                key: rule_key_path(hive, rule),
                detail: err.to_string(),
            }),
        }
    }
}

fn hive_root(hive: Hive) -> RegKey {
    match hive {
        Hive::Hklm => RegKey::predef(HKEY_LOCAL_MACHINE),
        Hive::Hkcu => RegKey::predef(HKEY_CURRENT_USER),
    }
}

const fn view_flag(view: RegView) -> u32 {
    match view {
        RegView::View64 => KEY_WOW64_64KEY,
        RegView::View32 => KEY_WOW64_32KEY,
    }
}

fn value_kind(vtype: RegType) -> RawValueKind {
    match vtype {
        RegType::REG_SZ => RawValueKind::Sz,
        RegType::REG_EXPAND_SZ => RawValueKind::ExpandSz,
        RegType::REG_MULTI_SZ => RawValueKind::MultiSz,
        RegType::REG_DWORD => RawValueKind::Dword,
        RegType::REG_QWORD => RawValueKind::Qword,
        RegType::REG_BINARY => RawValueKind::Binary,
        _ => RawValueKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_succeeds_on_windows() {
        assert!(NativeBackend::probe(), "HKLM\\Software must be readable");
    }

    #[test]
    fn reading_missing_rule_is_none_not_error() {
        let backend = NativeBackend;
        let result = backend.read_rule(
            Hive::Hkcu,
            RegView::View64,
            "qosadm-test-rule-that-should-not-exist",
        );
        assert!(matches!(result, Ok(None) | Ok(Some(_))));
    }

    #[test]
    fn listing_never_errors_for_current_user() {
        let backend = NativeBackend;
        // HKCU is always readable; an absent QoS root must read as empty.
        backend
            .list_rules(Hive::Hkcu, RegView::View64)
            .expect("HKCU listing must not error");
    }
}
