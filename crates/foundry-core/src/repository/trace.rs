//! Traceability repository trait definition.

use foundry_types::error::RepositoryError;
use foundry_types::log::{GenerationCall, SynthesisAttempt};

/// Append-only store for generation-call and synthesis-attempt records.
///
/// Writers treat failures as best-effort: a failed write is logged and
/// never changes control flow.
pub trait TraceRepository: Send + Sync {
    fn record_generation_call(
        &self,
        call: &GenerationCall,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn record_synthesis_attempt(
        &self,
        attempt: &SynthesisAttempt,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Most recent generation calls, newest first.
    fn recent_generation_calls(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<GenerationCall>, RepositoryError>> + Send;

    /// Synthesis attempts for one capability, oldest first.
    fn synthesis_attempts_for(
        &self,
        capability_name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<SynthesisAttempt>, RepositoryError>> + Send;
}
