//! One-time backend selection.
//!
//! The native API is probed exactly once, when the selector is constructed;
//! the decision holds for the selector's lifetime (one per process in
//! practice — the API layer constructs it at startup and threads it through
//! by reference). Callers go through the selector's uniform operations and
//! never branch on which backend is active; this module is the only place
//! that knows there are two.

use crate::error::QosError;
use crate::policy::PolicyRecord;
use crate::registry::regtool::RegToolBackend;
use crate::registry::{Hive, RegView, RegistryBackend};

/// Which implementation satisfies registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Native Win32 API.
    Native,
    /// `reg.exe` fallback.
    RegTool,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::RegTool => f.write_str("regtool"),
        }
    }
}

/// The process-wide registry access point.
pub struct BackendSelector {
    kind: BackendKind,
    backend: Box<dyn RegistryBackend>,
}

impl BackendSelector {
    /// Probe for native availability and pick the backend.
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(windows)]
        {
            if crate::registry::native::NativeBackend::probe() {
                return Self {
                    kind: BackendKind::Native,
                    backend: Box::new(crate::registry::native::NativeBackend),
                };
            }
            tracing::warn!("native registry API unavailable, falling back to reg.exe");
        }
        Self {
            kind: BackendKind::RegTool,
            backend: Box::new(RegToolBackend),
        }
    }

    /// Inject an arbitrary backend (tests, dependency injection).
    #[must_use]
    pub fn with_backend(kind: BackendKind, backend: Box<dyn RegistryBackend>) -> Self {
        Self { kind, backend }
    }

    /// The cached selection.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// See [`RegistryBackend::list_rules`].
    pub fn list_rules(&self, hive: Hive, view: RegView) -> Result<Vec<String>, QosError> {
        self.backend.list_rules(hive, view)
    }

    /// See [`RegistryBackend::read_rule`].
    pub fn read_rule(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
    ) -> Result<Option<PolicyRecord>, QosError> {
        self.backend.read_rule(hive, view, rule)
    }

    /// See [`RegistryBackend::write_field`].
    pub fn write_field(
        &self,
        hive: Hive,
        view: RegView,
        rule: &str,
        value_name: &str,
        data: &str,
    ) -> Result<(), QosError> {
        self.backend.write_field(hive, view, rule, value_name, data)
    }

    /// See [`RegistryBackend::delete_rule`].
    pub fn delete_rule(&self, hive: Hive, view: RegView, rule: &str) -> Result<bool, QosError> {
        self.backend.delete_rule(hive, view, rule)
    }
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
