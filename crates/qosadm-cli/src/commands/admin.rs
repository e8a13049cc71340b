//! Session diagnostics and editor launch.

use qosadm_core::QosApi;

use super::emit;

pub fn check_admin(api: &QosApi) -> bool {
    emit(&api.check_admin())
}

pub fn wizard(api: &QosApi) -> bool {
    emit(&api.launch_policy_editor())
}
