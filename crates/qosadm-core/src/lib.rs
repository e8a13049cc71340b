//! qosadm-core — policy synchronization and dual-backend registry access
//! for Windows Group-Policy QoS rules.
//!
//! # Components
//!
//! - **registry** — value codec, native (Win32) and `reg.exe` backends
//!   behind one trait, and the one-time backend selector
//! - **policy** — the canonical [`PolicyRecord`], four-quadrant
//!   enumeration, and the partial-update writer
//! - **provision** — active NetQos policy creation/removal through the
//!   PowerShell management surface
//! - **privilege** — the fail-closed elevation probe
//! - **api** — the uniform result boundary a presentation layer consumes
//!
//! Presentation (windows, tables, dialogs) lives outside this crate; it
//! drives [`api::QosApi`] and renders what comes back.

pub mod api;
pub mod error;
mod exec;
pub mod policy;
pub mod privilege;
pub mod provision;
pub mod registry;

pub use api::{ApiResult, QosApi};
pub use error::QosError;
pub use policy::{PolicyPatch, PolicyRecord};
pub use provision::ActivePolicyForm;
pub use registry::selector::{BackendKind, BackendSelector};
pub use registry::{Hive, RegView};
