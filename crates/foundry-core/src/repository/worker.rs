//! Worker and run-record repository trait definitions.

use chrono::{DateTime, Utc};

use foundry_types::error::RepositoryError;
use foundry_types::worker::{RunRecord, Worker, WorkerId, WorkerStatus};

/// Repository trait for worker records.
///
/// Implementations live in foundry-infra (e.g., SqliteWorkerRepository).
pub trait WorkerRepository: Send + Sync {
    /// Number of worker records ever created.
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Insert a new worker. Fails with `RepositoryError::Conflict` when the id is taken.
    fn insert(
        &self,
        worker: &Worker,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get(
        &self,
        id: &WorkerId,
    ) -> impl std::future::Future<Output = Result<Option<Worker>, RepositoryError>> + Send;

    /// All workers ordered by id.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Worker>, RepositoryError>> + Send;

    /// Overwrite the status field. Transition rules are enforced by callers.
    fn update_status(
        &self,
        id: &WorkerId,
        status: WorkerStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist the counters written at the end of every run.
    fn record_run(
        &self,
        id: &WorkerId,
        run_count: i64,
        last_run_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Repository trait for run records.
pub trait RunRepository: Send + Sync {
    fn insert(
        &self,
        record: &RunRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent runs of a worker, newest first.
    fn list_for_worker(
        &self,
        id: &WorkerId,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<RunRecord>, RepositoryError>> + Send;
}
