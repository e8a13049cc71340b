//! Dual-backend access to the Group-Policy QoS registry surface.
//!
//! Rules live under [`QOS_ROOT_SUBKEY`] in two hives ([`Hive`]) and two
//! WOW64-redirected views ([`RegView`]); the same rule name may exist
//! independently in all four combinations. Two interchangeable backends
//! implement [`RegistryBackend`]: a native Win32 API backend
//! (`native`, Windows builds only) and a `reg.exe` fallback (`regtool`).
//! For the same underlying registry state both must produce behaviorally
//! identical records; the [`selector`] picks one per process.

pub mod codec;
#[cfg(test)]
pub(crate) mod memory;
#[cfg(windows)]
pub mod native;
pub mod regtool;
pub mod selector;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QosError;
use crate::policy::PolicyRecord;

/// Subkey holding Policy-based QoS rules, relative to a hive root.
pub const QOS_ROOT_SUBKEY: &str = r"Software\Policies\Microsoft\Windows\QoS";

/// Registry hive a rule is declared in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Hive {
    /// Machine-wide policy (`HKEY_LOCAL_MACHINE`).
    #[default]
    #[serde(rename = "HKLM")]
    Hklm,
    /// Per-user policy (`HKEY_CURRENT_USER`).
    #[serde(rename = "HKCU")]
    Hkcu,
}

impl Hive {
    /// The expanded hive name `reg.exe` echoes in its query output
    /// (the tool accepts `HKLM` on input but prints `HKEY_LOCAL_MACHINE`).
    #[must_use]
    pub const fn full_name(self) -> &'static str {
        match self {
            Self::Hklm => "HKEY_LOCAL_MACHINE",
            Self::Hkcu => "HKEY_CURRENT_USER",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hklm => f.write_str("HKLM"),
            Self::Hkcu => f.write_str("HKCU"),
        }
    }
}

impl FromStr for Hive {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HKLM" | "HKEY_LOCAL_MACHINE" => Ok(Self::Hklm),
            "HKCU" | "HKEY_CURRENT_USER" => Ok(Self::Hkcu),
            other => Err(QosError::Validation {
                reason: format!("unknown hive '{other}': expected HKLM or HKCU"),
            }),
        }
    }
}

/// WOW64-redirected registry view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegView {
    /// 64-bit view (`KEY_WOW64_64KEY` / `/reg:64`).
    #[default]
    #[serde(rename = "64")]
    View64,
    /// 32-bit view (`KEY_WOW64_32KEY` / `/reg:32`).
    #[serde(rename = "32")]
    View32,
}

impl RegView {
    /// The `/reg:<N>` selector spelling used by `reg.exe`.
    #[must_use]
    pub const fn selector(self) -> &'static str {
        match self {
            Self::View64 => "64",
            Self::View32 => "32",
        }
    }
}

impl fmt::Display for RegView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for RegView {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "64" => Ok(Self::View64),
            "32" => Ok(Self::View32),
            other => Err(QosError::Validation {
                reason: format!("unknown registry view '{other}': expected 64 or 32"),
            }),
        }
    }
}

/// Fully-qualified path of the QoS policy root in `hive`.
#[must_use]
pub fn root_key_path(hive: Hive) -> String {
    format!("{hive}\\{QOS_ROOT_SUBKEY}")
}

/// Fully-qualified path of a rule subkey in `hive`.
#[must_use]
pub fn rule_key_path(hive: Hive, rule: &str) -> String {
    format!("{hive}\\{QOS_ROOT_SUBKEY}\\{rule}")
}

/// Uniform registry operations, each parameterized by (hive, view).
///
/// Contract shared by both implementations:
///
/// - an absent policy root is an empty result, never an error;
/// - `read_rule` decodes every known value name, defaulting missing or
///   undecodable values to the empty string;
/// - `write_field` opens-or-creates the rule subkey and stores the value as
///   `REG_SZ`;
/// - `delete_rule` returns `Ok(false)` (not an error) when the subkey did
///   not exist;
/// - any handle acquired during an operation is released before it returns,
///   on every exit path.
pub trait RegistryBackend: Send + Sync {
    /// Enumerate the immediate rule subkey names under the policy root.
    fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError>;

    /// Read one rule into a canonical record; `None` when the rule subkey
    /// cannot be opened.
    fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError>;

    /// Create-or-update a single `REG_SZ` value under the rule subkey.
    fn write_field(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
        value_name: &str,
        data: &str,
    ) -> Result<(), QosError>;

    /// Delete the rule subkey; `Ok(true)` when a key was removed,
    /// `Ok(false)` when there was nothing to delete.
    fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError>;
}
