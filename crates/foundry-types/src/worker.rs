//! Worker and run-record domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Human-readable, sequence-derived worker identifier (`worker_001`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub const PREFIX: &'static str = "worker_";

    /// Build the id for a 1-based sequence number, zero-padded to three digits.
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{}{seq:03}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| format!("invalid worker id: '{s}'"))?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid worker id: '{s}'"));
        }
        Ok(Self(s.to_string()))
    }
}

/// A materialized, launchable unit of autonomous execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    /// The plain-language request the worker was built from.
    pub instruction: String,
    pub role_text: String,
    pub goal: String,
    pub capabilities: Vec<String>,
    /// Hours between runs; 0 means run once.
    pub schedule_interval: u32,
    pub program_location: String,
    pub status: WorkerStatus,
    pub run_count: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Worker lifecycle states.
///
/// - Starting: record saved, program written, not yet checked for launch
/// - Ready: program verified on disk, may be launched
/// - Running: detached process spawned
/// - Stopped / Failed: terminal, reachable only from Running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Starting,
    Ready,
    Running,
    Stopped,
    Failed,
}

impl WorkerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerStatus::Stopped | WorkerStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: WorkerStatus) -> bool {
        use WorkerStatus::*;
        matches!(
            (self, next),
            (Starting, Ready) | (Ready, Running) | (Running, Stopped) | (Running, Failed)
        )
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Starting => write!(f, "starting"),
            WorkerStatus::Ready => write!(f, "ready"),
            WorkerStatus::Running => write!(f, "running"),
            WorkerStatus::Stopped => write!(f, "stopped"),
            WorkerStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starting" => Ok(WorkerStatus::Starting),
            "ready" => Ok(WorkerStatus::Ready),
            "running" => Ok(WorkerStatus::Running),
            "stopped" => Ok(WorkerStatus::Stopped),
            "failed" => Ok(WorkerStatus::Failed),
            other => Err(format!("invalid worker status: '{other}'")),
        }
    }
}

/// One execution attempt of a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub worker_id: WorkerId,
    /// 1-based, strictly increasing per worker.
    pub run_number: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub result_excerpt: String,
    pub error_excerpt: Option<String>,
}

impl RunRecord {
    pub const RESULT_LIMIT: usize = 1000;
    pub const ERROR_LIMIT: usize = 500;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(RunOutcome::Success),
            "failed" => Ok(RunOutcome::Failed),
            other => Err(format!("invalid run outcome: '{other}'")),
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
