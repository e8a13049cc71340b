//! Active NetQos policy commands (PowerShell management surface).

use clap::{Args, Subcommand};
use qosadm_core::{ActivePolicyForm, QosApi};

use super::emit;

#[derive(Subcommand, Debug)]
pub enum ActiveCommands {
    /// Create an active policy (New-NetQosPolicy); requires elevation
    Add(AddArgs),

    /// Remove an active policy from every store scope and clean up its
    /// registry declarations; requires elevation
    Remove {
        /// Policy name
        name: String,
    },

    /// Show one active policy (Get-NetQosPolicy)
    Show {
        /// Policy name
        name: String,

        /// Policy store to read (default: ActiveStore)
        #[arg(long)]
        store: Option<String>,
    },
}

/// Form fields for `New-NetQosPolicy`.
///
/// Both port flags exist, but the command surface supports a single port
/// condition: the first of --local-port/--remote-port holding a valid port
/// number is used and the other is ignored.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Policy name
    pub name: String,

    /// DSCP action 0-63 (values outside the range are clamped)
    #[arg(long)]
    pub dscp: Option<String>,

    /// Throttle in kilobytes per second; omitted or non-positive means
    /// unlimited
    #[arg(long)]
    pub throttle_kbps: Option<String>,

    /// Application path match condition
    #[arg(long)]
    pub application_name: Option<String>,

    /// Protocol match condition (TCP or UDP)
    #[arg(long)]
    pub protocol: Option<String>,

    /// Local (source) IP for the prefix condition
    #[arg(long)]
    pub local_ip: Option<String>,

    /// Prefix length paired with --local-ip
    #[arg(long)]
    pub local_prefix: Option<String>,

    /// Local port candidate for the single port condition
    #[arg(long)]
    pub local_port: Option<String>,

    /// Remote (destination) IP for the prefix condition
    #[arg(long)]
    pub remote_ip: Option<String>,

    /// Prefix length paired with --remote-ip
    #[arg(long)]
    pub remote_prefix: Option<String>,

    /// Remote port candidate for the single port condition
    #[arg(long)]
    pub remote_port: Option<String>,

    /// Network profile scope: All, Domain, Private or Public
    #[arg(long)]
    pub network_profile: Option<String>,

    /// Policy store target (e.g. localhost or GPO:localhost)
    #[arg(long)]
    pub policy_store: Option<String>,
}

impl AddArgs {
    fn into_form(self) -> ActivePolicyForm {
        ActivePolicyForm {
            name: self.name,
            dscp_value: self.dscp,
            throttle_rate_kbps: self.throttle_kbps,
            application_name: self.application_name,
            protocol: self.protocol,
            local_ip: self.local_ip,
            local_ip_prefix_length: self.local_prefix,
            local_port: self.local_port,
            remote_ip: self.remote_ip,
            remote_ip_prefix_length: self.remote_prefix,
            remote_port: self.remote_port,
            network_profile: self.network_profile,
            policy_store: self.policy_store,
        }
    }
}

pub fn run(api: &QosApi, command: ActiveCommands) -> bool {
    match command {
        ActiveCommands::Add(args) => emit(&api.provision_active_policy(&args.into_form())),
        ActiveCommands::Remove { name } => emit(&api.retire_active_policy(&name)),
        ActiveCommands::Show { name, store } => {
            emit(&api.show_active_policy(&name, store.as_deref()))
        },
    }
}
