//! Active NetQos policy provisioning through the PowerShell management
//! surface.
//!
//! Registry-declared GPO rules and *active* QoS policies are distinct
//! stores. This module translates a user-supplied form into a
//! `New-NetQosPolicy` invocation (with unit conversion and quote-doubling
//! escapes), removes policies best-effort across the three store scopes,
//! and cleans up the registry declarations afterwards. Both mutating entry
//! points are gated on [`crate::privilege::is_elevated`].

pub mod powershell;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QosError;
use crate::policy::writer;
use crate::privilege;
use crate::registry::selector::BackendSelector;

/// Upper bound of the 6-bit DSCP field.
pub const DSCP_MAX: i64 = 63;

/// Store scopes a removal sweeps, in order: local declared store, local
/// group-policy store, active runtime store.
pub const REMOVAL_STORES: [&str; 3] = ["localhost", "GPO:localhost", "ActiveStore"];

/// Network profiles accepted by `New-NetQosPolicy -NetworkProfile`.
///
/// The profile is interpolated as a bare token, so it is validated against
/// the cmdlet's enum instead of being escaped.
const NETWORK_PROFILES: [&str; 4] = ["All", "Domain", "Private", "Public"];

/// User-supplied input for one active policy.
///
/// Local and remote port are distinct slots, but the command surface
/// supports only a single `-IPPortMatchCondition`: the first of
/// local/remote that holds a valid port number becomes the condition and
/// the other is ignored. That is a limitation of the external surface, not
/// of this model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivePolicyForm {
    pub name: String,
    pub dscp_value: Option<String>,
    /// Throughput cap in kilobytes per second.
    pub throttle_rate_kbps: Option<String>,
    pub application_name: Option<String>,
    pub protocol: Option<String>,
    pub local_ip: Option<String>,
    pub local_ip_prefix_length: Option<String>,
    pub local_port: Option<String>,
    pub remote_ip: Option<String>,
    pub remote_ip_prefix_length: Option<String>,
    pub remote_port: Option<String>,
    pub network_profile: Option<String>,
    pub policy_store: Option<String>,
}

/// Result of a successful provision: the cmdlet transcript, including the
/// ActiveStore read-back.
#[derive(Debug, Serialize)]
pub struct ProvisionOutcome {
    pub transcript: String,
}

/// Result of a retire sweep.
#[derive(Debug, Serialize)]
pub struct RetireOutcome {
    pub transcript: String,
    /// Set when the policy is still visible in the ActiveStore after the
    /// sweep — typically a domain-level GPO outside local control.
    pub warning: Option<String>,
}

// ── Script construction ─────────────────────────────────────────────────

/// Escape a value for a single-quoted PowerShell string by doubling
/// embedded quotes.
#[must_use]
pub fn ps_escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn ps_quote(value: &str) -> String {
    format!("'{}'", ps_escape(value))
}

/// Convert a kilobytes-per-second figure to bits per second.
///
/// Non-numeric or non-positive input yields `None`, meaning "no throttle
/// argument" (unlimited).
#[must_use]
pub fn kbps_to_bits_per_second(raw: &str) -> Option<u64> {
    let rate: f64 = raw.trim().parse().ok()?;
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    // kB/s -> 1000 bytes -> 8000 bits.
    Some((rate * 1000.0 * 8.0).round() as u64)
}

/// Parse a DSCP figure, clamping into `[0, DSCP_MAX]`; `None` for
/// non-numeric input.
#[must_use]
pub fn clamp_dscp(raw: &str) -> Option<i64> {
    let value: i64 = raw.trim().parse().ok()?;
    Some(value.clamp(0, DSCP_MAX))
}

/// The single port condition the command surface supports: the first of
/// local/remote that is a valid port number.
#[must_use]
pub fn effective_port(local: Option<&str>, remote: Option<&str>) -> Option<u16> {
    [local, remote].into_iter().flatten().find_map(|raw| {
        let port: u32 = raw.trim().parse().ok()?;
        u16::try_from(port).ok().filter(|p| *p >= 1)
    })
}

fn validated_profile(raw: Option<&str>) -> Result<&'static str, QosError> {
    let Some(requested) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok("All");
    };
    NETWORK_PROFILES
        .into_iter()
        .find(|profile| profile.eq_ignore_ascii_case(requested))
        .ok_or_else(|| QosError::Validation {
            reason: format!(
                "unknown network profile '{requested}': expected one of {NETWORK_PROFILES:?}"
            ),
        })
}

/// Build the `New-NetQosPolicy` parameter list for `form`.
pub fn build_new_policy_params(form: &ActivePolicyForm) -> Result<Vec<String>, QosError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(QosError::blank_rule_name());
    }

    let mut params = vec![format!("-Name {}", ps_quote(name))];

    if let Some(dscp) = form.dscp_value.as_deref().and_then(clamp_dscp) {
        params.push(format!("-DSCPAction {dscp}"));
    }
    if let Some(bps) = form
        .throttle_rate_kbps
        .as_deref()
        .and_then(kbps_to_bits_per_second)
    {
        params.push(format!("-ThrottleRateActionBitsPerSecond {bps}"));
    }
    if let Some(app) = form
        .application_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        params.push(format!("-AppPathNameMatchCondition {}", ps_quote(app)));
    }
    if let Some(proto) = form.protocol.as_deref() {
        let proto = proto.trim().to_ascii_uppercase();
        if proto == "TCP" || proto == "UDP" {
            params.push(format!("-IPProtocolMatchCondition {proto}"));
        }
    }
    if let Some(port) = effective_port(form.local_port.as_deref(), form.remote_port.as_deref()) {
        params.push(format!("-IPPortMatchCondition {port}"));
    }
    if let (Some(ip), Some(len)) = (form.local_ip.as_deref(), form.local_ip_prefix_length.as_deref())
    {
        if !ip.trim().is_empty() && !len.trim().is_empty() {
            params.push(format!(
                "-IPSrcPrefixMatchCondition {}",
                ps_quote(&format!("{}/{}", ip.trim(), len.trim()))
            ));
        }
    }
    if let (Some(ip), Some(len)) = (
        form.remote_ip.as_deref(),
        form.remote_ip_prefix_length.as_deref(),
    ) {
        if !ip.trim().is_empty() && !len.trim().is_empty() {
            params.push(format!(
                "-IPDstPrefixMatchCondition {}",
                ps_quote(&format!("{}/{}", ip.trim(), len.trim()))
            ));
        }
    }

    params.push(format!("-NetworkProfile {}", validated_profile(form.network_profile.as_deref())?));

    let store = form
        .policy_store
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("localhost");
    params.push(format!("-PolicyStore {}", ps_quote(store)));

    Ok(params)
}

/// Full provision script: create the policy, then read it back from the
/// ActiveStore so the transcript shows what actually took effect.
pub fn build_provision_script(form: &ActivePolicyForm) -> Result<String, QosError> {
    let params = build_new_policy_params(form)?;
    let name = ps_quote(form.name.trim());
    Ok(format!(
        "$ErrorActionPreference = 'Stop'\n\
         New-NetQosPolicy {}\n\
         Get-NetQosPolicy -Name {name} -PolicyStore ActiveStore | Format-List *\n",
        params.join(" ")
    ))
}

/// Removal script: sweep all three store scopes independently (failures
/// suppressed per store), then read the ActiveStore back — any remaining
/// output means the policy is re-imposed from elsewhere.
#[must_use]
pub fn build_removal_script(name: &str) -> String {
    let quoted = ps_quote(name);
    let mut lines: Vec<String> = REMOVAL_STORES
        .iter()
        .map(|store| {
            format!(
                "Remove-NetQosPolicy -Name {quoted} -PolicyStore {} -Confirm:$false -ErrorAction SilentlyContinue",
                ps_quote(store)
            )
        })
        .collect();
    lines.push(format!(
        "Get-NetQosPolicy -Name {quoted} -PolicyStore ActiveStore -ErrorAction SilentlyContinue | Format-List *"
    ));
    lines.join("\n") + "\n"
}

/// Listing script for one policy in one store.
#[must_use]
pub fn build_show_script(name: &str, store: &str) -> String {
    format!(
        "Get-NetQosPolicy -Name {} -PolicyStore {} | Format-List *\n",
        ps_quote(name),
        ps_quote(store)
    )
}

// ── Execution ───────────────────────────────────────────────────────────

/// Create an active policy from `form`.
pub fn provision(form: &ActivePolicyForm) -> Result<ProvisionOutcome, QosError> {
    if !privilege::is_elevated() {
        return Err(QosError::PermissionDenied {
            operation: "provisioning an active QoS policy",
        });
    }
    let script = build_provision_script(form)?;
    debug!(name = %form.name.trim(), "provisioning active policy");
    let out = powershell::run_script(&script)?;
    if !out.success {
        return Err(QosError::CommandFailed {
            tool: "powershell.exe",
            detail: out.stderr_or("New-NetQosPolicy failed"),
        });
    }
    Ok(ProvisionOutcome {
        transcript: out.stdout,
    })
}

/// Remove an active policy from every store scope and clean up its
/// registry declarations.
///
/// The registry cleanup runs even when the script fails — a half-removed
/// policy should not keep stale declarations behind. A policy still
/// visible in the ActiveStore afterwards is reported as a warning, not an
/// error: it may be governed by a domain-level policy source this system
/// does not control.
pub fn retire(selector: &BackendSelector, name: &str) -> Result<RetireOutcome, QosError> {
    if !privilege::is_elevated() {
        return Err(QosError::PermissionDenied {
            operation: "removing an active QoS policy",
        });
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(QosError::blank_rule_name());
    }

    let result = powershell::run_script(&build_removal_script(name));
    writer::clean_all_locations(selector, name);

    let out = result?;
    if !out.success {
        return Err(QosError::CommandFailed {
            tool: "powershell.exe",
            detail: out.stderr_or("Remove-NetQosPolicy failed"),
        });
    }
    let warning = if out.stdout.trim().is_empty() {
        None
    } else {
        Some(
            "policy still present in the ActiveStore; it may be governed by a domain GPO and \
             reappear"
                .to_string(),
        )
    };
    Ok(RetireOutcome {
        transcript: out.stdout,
        warning,
    })
}

/// Read one policy back from one store (default: the ActiveStore).
pub fn show(name: &str, store: Option<&str>) -> Result<String, QosError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QosError::blank_rule_name());
    }
    let store = store.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("ActiveStore");
    let out = powershell::run_script(&build_show_script(name, store))?;
    if !out.success {
        return Err(QosError::NotFound {
            what: format!("active policy '{name}' in store '{store}'"),
        });
    }
    Ok(out.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str) -> ActivePolicyForm {
        ActivePolicyForm {
            name: name.to_string(),
            ..ActivePolicyForm::default()
        }
    }

    // ── Unit conversion ─────────────────────────────────────────────────

    #[test]
    fn kilobytes_per_second_become_bits_per_second() {
        assert_eq!(kbps_to_bits_per_second("1000"), Some(8_000_000));
        assert_eq!(kbps_to_bits_per_second("1"), Some(8_000));
        assert_eq!(kbps_to_bits_per_second("0.5"), Some(4_000));
    }

    #[test]
    fn non_positive_or_non_numeric_rate_means_unlimited() {
        assert_eq!(kbps_to_bits_per_second("0"), None);
        assert_eq!(kbps_to_bits_per_second("-1"), None);
        assert_eq!(kbps_to_bits_per_second("fast"), None);
        assert_eq!(kbps_to_bits_per_second(""), None);
        assert_eq!(kbps_to_bits_per_second("NaN"), None);
        assert_eq!(kbps_to_bits_per_second("inf"), None);
    }

    // ── DSCP clamping ───────────────────────────────────────────────────

    #[test]
    fn dscp_is_clamped_into_the_six_bit_range() {
        assert_eq!(clamp_dscp("100"), Some(63));
        assert_eq!(clamp_dscp("63"), Some(63));
        assert_eq!(clamp_dscp("0"), Some(0));
        assert_eq!(clamp_dscp("-5"), Some(0));
        assert_eq!(clamp_dscp("46"), Some(46));
    }

    #[test]
    fn non_numeric_dscp_is_omitted() {
        assert_eq!(clamp_dscp("ef"), None);
        assert_eq!(clamp_dscp(""), None);
    }

    // ── Port selection ──────────────────────────────────────────────────

    #[test]
    fn local_port_wins_when_both_are_valid() {
        assert_eq!(effective_port(Some("5060"), Some("8080")), Some(5060));
    }

    #[test]
    fn invalid_local_port_falls_through_to_remote() {
        assert_eq!(effective_port(Some("many"), Some("8080")), Some(8080));
        assert_eq!(effective_port(Some("0"), Some("8080")), Some(8080));
        assert_eq!(effective_port(Some("70000"), Some("8080")), Some(8080));
    }

    #[test]
    fn no_valid_port_means_no_condition() {
        assert_eq!(effective_port(None, None), None);
        assert_eq!(effective_port(Some(""), Some("*")), None);
    }

    // ── Escaping ────────────────────────────────────────────────────────

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(ps_escape("O'Brien"), "O''Brien");
        assert_eq!(ps_escape("''"), "''''");
        assert_eq!(ps_escape("plain"), "plain");
    }

    #[test]
    fn quoting_survives_hostile_names() {
        let mut hostile = form("x'; Remove-Item C:\\ -Recurse; '");
        hostile.policy_store = Some("store'".to_string());
        let params = build_new_policy_params(&hostile).expect("params build");
        assert_eq!(params[0], "-Name 'x''; Remove-Item C:\\ -Recurse; '''");
        assert!(params.iter().any(|p| p == "-PolicyStore 'store'''"));
    }

    // ── Parameter construction ──────────────────────────────────────────

    #[test]
    fn minimal_form_gets_name_profile_and_store_defaults() {
        let params = build_new_policy_params(&form("Voip")).expect("params");
        assert_eq!(
            params,
            vec!["-Name 'Voip'", "-NetworkProfile All", "-PolicyStore 'localhost'"]
        );
    }

    #[test]
    fn full_form_emits_every_condition() {
        let full = ActivePolicyForm {
            name: "Voip".to_string(),
            dscp_value: Some("46".to_string()),
            throttle_rate_kbps: Some("1000".to_string()),
            application_name: Some(r"C:\Program Files\voip.exe".to_string()),
            protocol: Some("udp".to_string()),
            local_ip: Some("10.0.0.1".to_string()),
            local_ip_prefix_length: Some("24".to_string()),
            local_port: None,
            remote_ip: Some("192.168.1.0".to_string()),
            remote_ip_prefix_length: Some("24".to_string()),
            remote_port: Some("5060".to_string()),
            network_profile: Some("domain".to_string()),
            policy_store: Some("GPO:localhost".to_string()),
        };
        let params = build_new_policy_params(&full).expect("params");
        assert!(params.contains(&"-DSCPAction 46".to_string()));
        assert!(params.contains(&"-ThrottleRateActionBitsPerSecond 8000000".to_string()));
        assert!(params.contains(&r"-AppPathNameMatchCondition 'C:\Program Files\voip.exe'".to_string()));
        assert!(params.contains(&"-IPProtocolMatchCondition UDP".to_string()));
        assert!(params.contains(&"-IPPortMatchCondition 5060".to_string()));
        assert!(params.contains(&"-IPSrcPrefixMatchCondition '10.0.0.1/24'".to_string()));
        assert!(params.contains(&"-IPDstPrefixMatchCondition '192.168.1.0/24'".to_string()));
        assert!(params.contains(&"-NetworkProfile Domain".to_string()));
        assert!(params.contains(&"-PolicyStore 'GPO:localhost'".to_string()));
    }

    #[test]
    fn prefix_condition_requires_both_ip_and_length() {
        let mut partial = form("Voip");
        partial.local_ip = Some("10.0.0.1".to_string());
        let params = build_new_policy_params(&partial).expect("params");
        assert!(!params.iter().any(|p| p.contains("IPSrcPrefix")));
    }

    #[test]
    fn unknown_protocol_is_passed_over_silently() {
        let mut icmp = form("Voip");
        icmp.protocol = Some("ICMP".to_string());
        let params = build_new_policy_params(&icmp).expect("params");
        assert!(!params.iter().any(|p| p.contains("IPProtocolMatchCondition")));
    }

    #[test]
    fn blank_name_is_a_validation_error() {
        let err = build_new_policy_params(&form("   ")).expect_err("blank name");
        assert!(matches!(err, QosError::Validation { .. }));
    }

    #[test]
    fn unknown_network_profile_is_rejected() {
        let mut bad = form("Voip");
        bad.network_profile = Some("Hostile; Stop-Computer".to_string());
        let err = build_new_policy_params(&bad).expect_err("must reject");
        assert!(matches!(err, QosError::Validation { .. }));
    }

    // ── Scripts ─────────────────────────────────────────────────────────

    #[test]
    fn provision_script_creates_then_reads_back() {
        let script = build_provision_script(&form("Voip")).expect("script");
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "$ErrorActionPreference = 'Stop'");
        assert!(lines[1].starts_with("New-NetQosPolicy -Name 'Voip'"));
        assert!(lines[2].starts_with("Get-NetQosPolicy -Name 'Voip' -PolicyStore ActiveStore"));
    }

    #[test]
    fn removal_script_sweeps_all_three_stores_independently() {
        let script = build_removal_script("Voip");
        for store in REMOVAL_STORES {
            assert!(
                script.contains(&format!("-PolicyStore '{store}' -Confirm:$false -ErrorAction SilentlyContinue")),
                "missing store {store}: {script}"
            );
        }
        assert!(script.contains("Get-NetQosPolicy -Name 'Voip' -PolicyStore ActiveStore"));
    }

    #[test]
    fn show_script_targets_the_requested_store() {
        let script = build_show_script("Voip", "GPO:localhost");
        assert_eq!(
            script,
            "Get-NetQosPolicy -Name 'Voip' -PolicyStore 'GPO:localhost' | Format-List *\n"
        );
    }

    // ── Gate behavior off-Windows ───────────────────────────────────────

    #[test]
    #[cfg(not(windows))]
    fn provision_fails_closed_without_elevation() {
        let err = provision(&form("Voip")).expect_err("not elevated off Windows");
        assert!(matches!(err, QosError::PermissionDenied { .. }));
    }
}
