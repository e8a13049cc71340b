//! Declared-rule commands: list, create/update, delete.

use clap::Args;
use qosadm_core::{Hive, PolicyPatch, QosApi, RegView};

use super::emit;

/// Field arguments shared by `create` and `update`. Flags left out stay
/// untouched in the registry — updates are partial by design.
#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Rule name (the registry subkey)
    pub name: String,

    /// Target hive (HKLM or HKCU)
    #[arg(long, default_value = "HKLM")]
    pub hive: Hive,

    /// Target registry view (64 or 32)
    #[arg(long, default_value = "64")]
    pub view: RegView,

    /// Application path match, or * for any
    #[arg(long)]
    pub application_name: Option<String>,

    /// DSCP value 0-63, or * for unset
    #[arg(long)]
    pub dscp: Option<String>,

    /// Throttle rate in KBps; -1 for unlimited
    #[arg(long)]
    pub throttle_rate: Option<String>,

    /// Protocol match: *, TCP or UDP
    #[arg(long)]
    pub protocol: Option<String>,

    /// Local IP match, literal or *
    #[arg(long)]
    pub local_ip: Option<String>,

    /// Local IP prefix length
    #[arg(long)]
    pub local_prefix: Option<String>,

    /// Local port, range or *
    #[arg(long)]
    pub local_port: Option<String>,

    /// Remote IP match, literal or *
    #[arg(long)]
    pub remote_ip: Option<String>,

    /// Remote IP prefix length
    #[arg(long)]
    pub remote_prefix: Option<String>,

    /// Remote port, range or *
    #[arg(long)]
    pub remote_port: Option<String>,

    /// Schema version string (defaults to 1.0 on create)
    #[arg(long)]
    pub version: Option<String>,
}

impl PatchArgs {
    fn into_patch(self) -> PolicyPatch {
        PolicyPatch {
            rule: self.name,
            hive: Some(self.hive),
            view: Some(self.view),
            application_name: self.application_name,
            dscp_value: self.dscp,
            throttle_rate: self.throttle_rate,
            protocol: self.protocol,
            local_ip: self.local_ip,
            local_ip_prefix_length: self.local_prefix,
            local_port: self.local_port,
            remote_ip: self.remote_ip,
            remote_ip_prefix_length: self.remote_prefix,
            remote_port: self.remote_port,
            version: self.version,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Rule name
    pub name: String,

    /// Hive holding the rule
    #[arg(long, default_value = "HKLM")]
    pub hive: Hive,

    /// Registry view holding the rule
    #[arg(long, default_value = "64")]
    pub view: RegView,

    /// Remove the rule from all four (hive, view) locations, best-effort
    #[arg(long)]
    pub everywhere: bool,
}

pub fn list(api: &QosApi) -> bool {
    emit(&api.list_policies())
}

pub fn create(api: &QosApi, args: PatchArgs) -> bool {
    let mut patch = args.into_patch();
    if patch.version.is_none() {
        patch.version = Some("1.0".to_string());
    }
    emit(&api.create_or_update_policy(&patch))
}

pub fn update(api: &QosApi, args: PatchArgs) -> bool {
    // No version default here: an update writes only what was asked.
    emit(&api.create_or_update_policy(&args.into_patch()))
}

pub fn delete(api: &QosApi, args: DeleteArgs) -> bool {
    if args.everywhere {
        emit(&api.delete_policy_everywhere(&args.name))
    } else {
        emit(&api.delete_policy(&args.name, args.hive, args.view))
    }
}
