//! Subcommand implementations, one module per command family.

pub mod active;
pub mod admin;
pub mod policies;

use qosadm_core::ApiResult;
use serde::Serialize;

/// Print a boundary result as pretty JSON and report its success flag.
pub(crate) fn emit<T: Serialize>(result: &ApiResult<T>) -> bool {
    match serde_json::to_string_pretty(result) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to render result: {err}"),
    }
    result.success
}
