//! Capability repository trait definition.

use foundry_types::capability::{Capability, CapabilityStatus, TestVerdict};
use foundry_types::error::RepositoryError;

/// Repository trait for synthesized capability records.
///
/// Built-in capabilities are never stored. Records are never hard-deleted;
/// a capability leaves circulation by becoming inactive.
pub trait CapabilityRepository: Send + Sync {
    /// Insert or replace the record for `capability.name`.
    fn upsert(
        &self,
        capability: &Capability,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a record by name, regardless of status.
    fn get(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Capability>, RepositoryError>> + Send;

    /// All active synthesized records, ordered by name.
    fn list_active(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Capability>, RepositoryError>> + Send;

    /// Every stored record, ordered by name.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Capability>, RepositoryError>> + Send;

    /// Record a smoke-test verdict and the status that follows from it.
    fn set_verdict(
        &self,
        name: &str,
        verdict: TestVerdict,
        output: &str,
        status: CapabilityStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Attach the owning worker to a record.
    fn set_owner(
        &self,
        name: &str,
        worker_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
