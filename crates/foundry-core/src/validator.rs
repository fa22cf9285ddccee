//! Sandbox validator port.
//!
//! The subprocess implementation lives in foundry-infra. Validation is
//! infallible from the caller's point of view: every failure mode,
//! including timeouts and interpreter spawn errors, is a failed report.

use std::path::Path;

use foundry_types::capability::ValidationReport;

pub trait CapabilityValidator: Send + Sync {
    /// `validate(name, source_location) -> {passed, output, error}`.
    fn validate(
        &self,
        name: &str,
        source_location: &Path,
    ) -> impl std::future::Future<Output = ValidationReport> + Send;
}
