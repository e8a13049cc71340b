//! `reg.exe` fallback backend.
//!
//! Used when the native API is unavailable. Each operation invokes the
//! registry command-line tool with an argv (never a shell string) and a
//! `/reg:<32|64>` view selector, bounded by [`REG_TOOL_TIMEOUT`]. Query
//! output is parsed into per-key blocks: a line starting with `HKEY_` opens
//! a block, and each following `name  REG_<TYPE>  value` triple lands in it.
//! Value names missing from a block decode to the empty string, matching
//! the native backend's behavior for absent or undecodable values.
//!
//! `reg.exe` echoes expanded hive names (`HKEY_LOCAL_MACHINE`, not the
//! `HKLM` it accepts on input), so block paths are matched against
//! [`Hive::full_name`] case-insensitively.

use std::collections::BTreeMap;
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::QosError;
use crate::exec::{run_bounded, ToolOutput};
use crate::policy::PolicyRecord;
use crate::registry::{rule_key_path, Hive, RegView, RegistryBackend, QOS_ROOT_SUBKEY};

/// Fixed budget for one `reg.exe` invocation.
pub const REG_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

const REG_TOOL: &str = "reg";

/// Registry access through the `reg.exe` command-line tool.
#[derive(Debug, Default)]
pub struct RegToolBackend;

impl RegistryBackend for RegToolBackend {
    fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError> {
        let out = run_reg(&query_args(&invocation_root(hive), view))?;
        if !out.success {
            // The tool exits nonzero both for an absent root and for real
            // failures; either way there is nothing to enumerate.
            return Ok(Vec::new());
        }
        Ok(rule_names_from_query(&out.stdout, &expanded_root(hive)))
    }

    fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError> {
        let key = format!("{}\\{rule}", invocation_root(hive));
        let out = run_reg(&query_args(&key, view))?;
        if !out.success {
            return Ok(None);
        }
        let expanded = format!("{}\\{rule}", expanded_root(hive));
        let blocks = parse_reg_query(&out.stdout);
        let values = blocks
            .iter()
            .find(|block| block.path.eq_ignore_ascii_case(&expanded))
            .map(|block| block.values.clone())
            .unwrap_or_default();
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
        let key = format!("{}\\{rule}", invocation_root(hive));
        let out = run_reg(&add_value_args(&key, value_name, data, view))?;
        if out.success {
            Ok(())
        } else {
            Err(QosError::Backend {
                op: "write",
                key: rule_key_path(hive, rule),
                detail: out.stderr_or("reg add failed"),
            })
        }
    }

    fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError> {
        let key = format!("{}\\{rule}", invocation_root(hive));
        // Probe first: the tool reports "not found" and "failed" with the
        // same exit status, and deleting a missing key must not be an error.
        let probe = run_reg(&query_args(&key, view))?;
        if !probe.success {
            return Ok(false);
        }
        let out = run_reg(&delete_args(&key, view))?;
        if out.success {
            Ok(true)
        } else {
            Err(QosError::Backend {
                op: "delete",
                key: rule_key_path(hive, rule),
                detail: out.stderr_or("reg delete failed"),
            })
        }
    }
}

/// One key's worth of parsed `reg query` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBlock {
    /// The key path exactly as the tool printed it.
    pub path: String,
    /// `name -> value` for every value line inside the block.
    pub values: BTreeMap<String, String>,
}

/// Group `reg query` stdout into per-key blocks.
pub fn parse_reg_query(stdout: &str) -> Vec<KeyBlock> {
    static VALUE_LINE: OnceLock<Regex> = OnceLock::new();
    let value_line = VALUE_LINE.get_or_init(|| {
        Regex::new(r"^(.+?)\s+(REG_[A-Z0-9_]+)\s+(.+)$").expect("static regex compiles")
    });

    let mut blocks = Vec::new();
    let mut current: Option<KeyBlock> = None;
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("HKEY_") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(KeyBlock {
                path: line.to_string(),
                values: BTreeMap::new(),
            });
        } else if let Some(block) = current.as_mut() {
            if let Some(caps) = value_line.captures(line) {
                block
                    .values
                    .insert(caps[1].trim().to_string(), caps[3].trim().to_string());
            }
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    blocks
}

/// Extract rule names from a root query: every printed key path that
/// extends the root by one segment, reduced to its last segment.
pub(crate) fn rule_names_from_query(stdout: &str, expanded_root: &str) -> Vec<String> {
    let prefix = format!("{}\\", expanded_root.to_ascii_lowercase());
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.to_ascii_lowercase().starts_with(&prefix))
        .filter_map(|line| line.rsplit('\\').next())
        .map(str::to_string)
        .collect()
}

pub(crate) fn query_args(key: &str, view: RegView) -> Vec<String> {
    vec![
        "query".to_string(),
        key.to_string(),
        format!("/reg:{}", view.selector()),
    ]
}

pub(crate) fn add_value_args(key: &str, name: &str, data: &str, view: RegView) -> Vec<String> {
    vec![
        "add".to_string(),
        key.to_string(),
        "/v".to_string(),
        name.to_string(),
        "/t".to_string(),
        "REG_SZ".to_string(),
        "/d".to_string(),
        data.to_string(),
        "/f".to_string(),
        format!("/reg:{}", view.selector()),
    ]
}

pub(crate) fn delete_args(key: &str, view: RegView) -> Vec<String> {
    vec![
        "delete".to_string(),
        key.to_string(),
        "/f".to_string(),
        format!("/reg:{}", view.selector()),
    ]
}

/// The short key path handed to the tool on invocation.
fn invocation_root(hive: Hive) -> String {
    format!("{hive}\\{QOS_ROOT_SUBKEY}")
}

/// The expanded key path the tool echoes back in query output.
fn expanded_root(hive: Hive) -> String {
    format!("{}\\{QOS_ROOT_SUBKEY}", hive.full_name())
}

fn run_reg(args: &[String]) -> Result<ToolOutput, QosError> {
    let mut cmd = Command::new(REG_TOOL);
    cmd.args(args);
    run_bounded(cmd, REG_TOOL, REG_TOOL_TIMEOUT)
}
