//! Traceability records: generation calls and synthesis attempts.
//!
//! These are append-only and never consulted for control flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attempt against one provider, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationCall {
    pub id: Uuid,
    /// Task kind (snake_case), or a pseudo-kind such as `agent_plan`.
    pub task_kind: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub prompt_chars: i64,
    pub response_chars: i64,
    pub success: bool,
    /// The provider was not first in the resolved route.
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl GenerationCall {
    pub const REASON_LIMIT: usize = 200;
}

/// One synthesis attempt for a capability gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisAttempt {
    pub id: Uuid,
    pub capability_name: String,
    pub requested_for: Option<String>,
    pub attempt_number: u32,
    pub purpose: String,
    pub source: String,
    /// Source passed the declaration check and was written to storage.
    pub accepted: bool,
    /// Sandbox verdict, when the attempt got that far.
    pub test_passed: Option<bool>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
