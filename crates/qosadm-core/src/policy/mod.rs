//! Canonical QoS policy records and their registry field mapping.
//!
//! A [`PolicyRecord`] is a fresh read-time snapshot of one rule subkey in
//! one (hive, view) location; it never persists across calls. Writes go
//! through [`PolicyPatch`], whose `None` fields mean "leave untouched"
//! (partial updates never reset absent fields to a wildcard).

pub mod enumerate;
pub mod writer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::registry::{rule_key_path, Hive, RegView};

/// `Application Name` registry value.
pub const VAL_APPLICATION_NAME: &str = "Application Name";
/// `DSCP Value` registry value.
pub const VAL_DSCP_VALUE: &str = "DSCP Value";
/// `Throttle Rate` registry value.
pub const VAL_THROTTLE_RATE: &str = "Throttle Rate";
/// `Protocol` registry value.
pub const VAL_PROTOCOL: &str = "Protocol";
/// `Local IP` registry value.
pub const VAL_LOCAL_IP: &str = "Local IP";
/// `Local IP Prefix Length` registry value.
pub const VAL_LOCAL_IP_PREFIX_LENGTH: &str = "Local IP Prefix Length";
/// `Local Port` registry value.
pub const VAL_LOCAL_PORT: &str = "Local Port";
/// `Remote IP` registry value.
pub const VAL_REMOTE_IP: &str = "Remote IP";
/// `Remote IP Prefix Length` registry value.
pub const VAL_REMOTE_IP_PREFIX_LENGTH: &str = "Remote IP Prefix Length";
/// `Remote Port` registry value.
pub const VAL_REMOTE_PORT: &str = "Remote Port";
/// `Version` registry value.
pub const VAL_VERSION: &str = "Version";

/// Every value name a rule subkey may carry, in canonical write order.
pub const RULE_VALUE_NAMES: &[&str; 11] = &[
    VAL_APPLICATION_NAME,
    VAL_DSCP_VALUE,
    VAL_THROTTLE_RATE,
    VAL_PROTOCOL,
    VAL_LOCAL_IP,
    VAL_LOCAL_IP_PREFIX_LENGTH,
    VAL_LOCAL_PORT,
    VAL_REMOTE_IP,
    VAL_REMOTE_IP_PREFIX_LENGTH,
    VAL_REMOTE_PORT,
    VAL_VERSION,
];

/// Whether a match-condition value means "not restricted".
///
/// The registry schema spells the wildcard either as an absent value (which
/// decodes to `""`) or as a literal `*`; both are semantically equivalent
/// and readers must treat them as such. Raw values are preserved for
/// display — this helper is the interpretation point.
#[must_use]
pub fn is_unrestricted(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "*"
}

/// One rule as declared in one (hive, view) location.
///
/// All semantically numeric fields (DSCP, throttle rate, prefix lengths)
/// are strings: the policy schema stores every value as `REG_SZ` and this
/// model preserves that external constraint. `key_path` is derived and
/// informational, not authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub hive: Hive,
    pub view: RegView,
    pub rule: String,
    pub key_path: String,
    pub application_name: String,
    pub dscp_value: String,
    pub throttle_rate: String,
    pub protocol: String,
    pub local_ip: String,
    pub local_ip_prefix_length: String,
    pub local_port: String,
    pub remote_ip: String,
    pub remote_ip_prefix_length: String,
    pub remote_port: String,
    pub version: String,
}

impl PolicyRecord {
    /// Assemble a record from decoded registry values.
    ///
    /// Both backends call this with whatever values the rule subkey carried;
    /// names absent from `values` default to the empty string, so a missing
    /// value and an undecodable one are indistinguishable downstream. This
    /// shared assembly is what keeps the two backends behaviorally
    /// identical.
    #[must_use]
    pub fn from_values(
        hive: Hive,
        view: RegView,
        rule: &str,
        values: &BTreeMap<String, String>,
    ) -> Self {
        let get = |name: &str| values.get(name).cloned().unwrap_or_default();
        Self {
            hive,
            view,
            rule: rule.to_string(),
            key_path: rule_key_path(hive, rule),
            application_name: get(VAL_APPLICATION_NAME),
            dscp_value: get(VAL_DSCP_VALUE),
            throttle_rate: get(VAL_THROTTLE_RATE),
            protocol: get(VAL_PROTOCOL),
            local_ip: get(VAL_LOCAL_IP),
            local_ip_prefix_length: get(VAL_LOCAL_IP_PREFIX_LENGTH),
            local_port: get(VAL_LOCAL_PORT),
            remote_ip: get(VAL_REMOTE_IP),
            remote_ip_prefix_length: get(VAL_REMOTE_IP_PREFIX_LENGTH),
            remote_port: get(VAL_REMOTE_PORT),
            version: get(VAL_VERSION),
        }
    }
}

/// Write-side input for create-or-update.
///
/// `None` fields are left untouched in the registry. `hive` and `view`
/// default to machine-wide / 64-bit when unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyPatch {
    pub rule: String,
    pub hive: Option<Hive>,
    pub view: Option<RegView>,
    pub application_name: Option<String>,
    pub dscp_value: Option<String>,
    pub throttle_rate: Option<String>,
    pub protocol: Option<String>,
    pub local_ip: Option<String>,
    pub local_ip_prefix_length: Option<String>,
    pub local_port: Option<String>,
    pub remote_ip: Option<String>,
    pub remote_ip_prefix_length: Option<String>,
    pub remote_port: Option<String>,
    pub version: Option<String>,
}

impl PolicyPatch {
    /// A patch naming `rule` with every field left untouched.
    #[must_use]
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Self::default()
        }
    }

    /// The patch's fields paired with their registry value names, in
    /// canonical write order.
    pub(crate) fn field_entries(&self) -> [(&'static str, Option<&str>); 11] {
        [
            (VAL_APPLICATION_NAME, self.application_name.as_deref()),
            (VAL_DSCP_VALUE, self.dscp_value.as_deref()),
            (VAL_THROTTLE_RATE, self.throttle_rate.as_deref()),
            (VAL_PROTOCOL, self.protocol.as_deref()),
            (VAL_LOCAL_IP, self.local_ip.as_deref()),
            (
                VAL_LOCAL_IP_PREFIX_LENGTH,
                self.local_ip_prefix_length.as_deref(),
            ),
            (VAL_LOCAL_PORT, self.local_port.as_deref()),
            (VAL_REMOTE_IP, self.remote_ip.as_deref()),
            (
                VAL_REMOTE_IP_PREFIX_LENGTH,
                self.remote_ip_prefix_length.as_deref(),
            ),
            (VAL_REMOTE_PORT, self.remote_port.as_deref()),
            (VAL_VERSION, self.version.as_deref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_values_defaults_missing_names_to_empty() {
        let mut values = BTreeMap::new();
        values.insert(VAL_PROTOCOL.to_string(), "UDP".to_string());
        values.insert(VAL_REMOTE_PORT.to_string(), "5060".to_string());

        let record = PolicyRecord::from_values(Hive::Hklm, RegView::View64, "VoipQoS", &values);
        assert_eq!(record.rule, "VoipQoS");
        assert_eq!(record.protocol, "UDP");
        assert_eq!(record.remote_port, "5060");
        assert_eq!(record.application_name, "");
        assert_eq!(record.dscp_value, "");
        assert!(record.key_path.ends_with(r"\VoipQoS"), "{}", record.key_path);
    }

    #[test]
    fn from_values_ignores_unknown_names() {
        let mut values = BTreeMap::new();
        values.insert("Unknown Value".to_string(), "x".to_string());
        let record = PolicyRecord::from_values(Hive::Hkcu, RegView::View32, "r", &values);
        assert_eq!(record.version, "");
        assert_eq!(record.hive, Hive::Hkcu);
        assert_eq!(record.view, RegView::View32);
    }

    #[test]
    fn unrestricted_treats_absent_and_star_alike() {
        assert!(is_unrestricted(""));
        assert!(is_unrestricted("*"));
        assert!(is_unrestricted("  *  "));
        assert!(!is_unrestricted("TCP"));
        assert!(!is_unrestricted("0"));
    }

    #[test]
    fn field_entries_cover_every_value_name_in_order() {
        let patch = PolicyPatch::new("r");
        let names: Vec<&str> = patch.field_entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names.as_slice(), RULE_VALUE_NAMES);
    }

    #[test]
    fn patch_new_leaves_all_fields_untouched() {
        let patch = PolicyPatch::new("r");
        assert!(patch.field_entries().iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn record_serializes_with_boundary_enum_spellings() {
        let record = PolicyRecord::from_values(
            Hive::Hklm,
            RegView::View64,
            "VoipQoS",
            &BTreeMap::new(),
        );
        let json = serde_json::to_value(&record).expect("serializable");
        assert_eq!(json["hive"], "HKLM");
        assert_eq!(json["view"], "64");
        assert_eq!(json["rule"], "VoipQoS");
    }

    #[test]
    fn patch_deserializes_with_missing_fields() {
        let patch: PolicyPatch =
            serde_json::from_str(r#"{"rule":"R","dscp_value":"46"}"#).expect("parses");
        assert_eq!(patch.rule, "R");
        assert_eq!(patch.dscp_value.as_deref(), Some("46"));
        assert!(patch.hive.is_none());
        assert!(patch.application_name.is_none());
    }
}
