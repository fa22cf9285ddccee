//! In-memory doubles for the repository, filesystem and generator ports.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use foundry_types::capability::{Capability, CapabilityStatus, TestVerdict, ValidationReport};
use foundry_types::error::RepositoryError;
use foundry_types::llm::{LlmError, TaskKind};
use foundry_types::log::{GenerationCall, SynthesisAttempt};
use foundry_types::worker::{RunRecord, Worker, WorkerId, WorkerStatus};

use crate::fs::FileSystem;
use crate::launch::ProcessSpawner;
use crate::llm::gateway::{GatewayReply, TextGenerator};
use crate::repository::capability::CapabilityRepository;
use crate::repository::trace::TraceRepository;
use crate::repository::worker::{RunRepository, WorkerRepository};
use crate::validator::CapabilityValidator;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryTrace {
    calls: Arc<Mutex<Vec<GenerationCall>>>,
    attempts: Arc<Mutex<Vec<SynthesisAttempt>>>,
}

impl MemoryTrace {
    pub fn calls(&self) -> Vec<GenerationCall> {
        lock(&self.calls).clone()
    }

    pub fn attempts(&self) -> Vec<SynthesisAttempt> {
        lock(&self.attempts).clone()
    }
}

impl TraceRepository for MemoryTrace {
    async fn record_generation_call(&self, call: &GenerationCall) -> Result<(), RepositoryError> {
        lock(&self.calls).push(call.clone());
        Ok(())
    }

    async fn record_synthesis_attempt(
        &self,
        attempt: &SynthesisAttempt,
    ) -> Result<(), RepositoryError> {
        lock(&self.attempts).push(attempt.clone());
        Ok(())
    }

    async fn recent_generation_calls(
        &self,
        limit: i64,
    ) -> Result<Vec<GenerationCall>, RepositoryError> {
        Ok(lock(&self.calls)
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn synthesis_attempts_for(
        &self,
        capability_name: &str,
    ) -> Result<Vec<SynthesisAttempt>, RepositoryError> {
        Ok(lock(&self.attempts)
            .iter()
            .filter(|a| a.capability_name == capability_name)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryCapabilities {
    records: Arc<Mutex<BTreeMap<String, Capability>>>,
    upserts: Arc<Mutex<usize>>,
    failing: Arc<Mutex<bool>>,
}

impl MemoryCapabilities {
    pub fn insert(&self, capability: Capability) {
        lock(&self.records).insert(capability.name.clone(), capability);
    }

    pub fn get_sync(&self, name: &str) -> Option<Capability> {
        lock(&self.records).get(name).cloned()
    }

    pub fn upserts(&self) -> usize {
        *lock(&self.upserts)
    }

    /// Make every repository call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if *lock(&self.failing) {
            return Err(RepositoryError::Query("store offline".to_string()));
        }
        Ok(())
    }
}

impl CapabilityRepository for MemoryCapabilities {
    async fn upsert(&self, capability: &Capability) -> Result<(), RepositoryError> {
        self.check()?;
        *lock(&self.upserts) += 1;
        self.insert(capability.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Capability>, RepositoryError> {
        self.check()?;
        Ok(self.get_sync(name))
    }

    async fn list_active(&self) -> Result<Vec<Capability>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.records)
            .values()
            .filter(|c| c.is_active())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Capability>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.records).values().cloned().collect())
    }

    async fn set_verdict(
        &self,
        name: &str,
        verdict: TestVerdict,
        output: &str,
        status: CapabilityStatus,
    ) -> Result<(), RepositoryError> {
        self.check()?;
        let mut records = lock(&self.records);
        let record = records.get_mut(name).ok_or(RepositoryError::NotFound)?;
        record.test_verdict = verdict;
        record.test_output = Some(output.to_string());
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_owner(&self, name: &str, worker_id: &str) -> Result<(), RepositoryError> {
        self.check()?;
        let mut records = lock(&self.records);
        let record = records.get_mut(name).ok_or(RepositoryError::NotFound)?;
        record.created_for = Some(worker_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Workers and runs
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryWorkers {
    workers: Arc<Mutex<BTreeMap<String, Worker>>>,
    failing_status: Arc<Mutex<bool>>,
}

impl MemoryWorkers {
    pub fn get_sync(&self, id: &str) -> Option<Worker> {
        lock(&self.workers).get(id).cloned()
    }

    pub fn put(&self, worker: Worker) {
        lock(&self.workers).insert(worker.id.to_string(), worker);
    }

    /// Make `update_status` fail until reset.
    pub fn set_failing_status(&self, failing: bool) {
        *lock(&self.failing_status) = failing;
    }
}

impl WorkerRepository for MemoryWorkers {
    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(lock(&self.workers).len() as u64)
    }

    async fn insert(&self, worker: &Worker) -> Result<(), RepositoryError> {
        let mut workers = lock(&self.workers);
        if workers.contains_key(worker.id.as_str()) {
            return Err(RepositoryError::Conflict(worker.id.to_string()));
        }
        workers.insert(worker.id.to_string(), worker.clone());
        Ok(())
    }

    async fn get(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError> {
        Ok(self.get_sync(id.as_str()))
    }

    async fn list(&self) -> Result<Vec<Worker>, RepositoryError> {
        Ok(lock(&self.workers).values().cloned().collect())
    }

    async fn update_status(&self, id: &WorkerId, status: WorkerStatus) -> Result<(), RepositoryError> {
        if *lock(&self.failing_status) {
            return Err(RepositoryError::Query("store offline".to_string()));
        }
        let mut workers = lock(&self.workers);
        let worker = workers.get_mut(id.as_str()).ok_or(RepositoryError::NotFound)?;
        worker.status = status;
        Ok(())
    }

    async fn record_run(
        &self,
        id: &WorkerId,
        run_count: i64,
        last_run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut workers = lock(&self.workers);
        let worker = workers.get_mut(id.as_str()).ok_or(RepositoryError::NotFound)?;
        worker.run_count = run_count;
        worker.last_run_at = Some(last_run_at);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryRuns {
    runs: Arc<Mutex<Vec<RunRecord>>>,
}

impl MemoryRuns {
    pub fn all(&self) -> Vec<RunRecord> {
        lock(&self.runs).clone()
    }
}

impl RunRepository for MemoryRuns {
    async fn insert(&self, record: &RunRecord) -> Result<(), RepositoryError> {
        lock(&self.runs).push(record.clone());
        Ok(())
    }

    async fn list_for_worker(
        &self,
        id: &WorkerId,
        limit: i64,
    ) -> Result<Vec<RunRecord>, RepositoryError> {
        Ok(lock(&self.runs)
            .iter()
            .rev()
            .filter(|r| &r.worker_id == id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryFs {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    executable: Arc<Mutex<Vec<PathBuf>>>,
    failing_writes: Arc<Mutex<bool>>,
}

impl MemoryFs {
    /// Make `write_file` fail until reset.
    pub fn set_failing_writes(&self, failing: bool) {
        *lock(&self.failing_writes) = failing;
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    pub fn is_executable(&self, path: &Path) -> bool {
        lock(&self.executable).iter().any(|p| p == path)
    }

    pub fn remove(&self, path: &Path) {
        lock(&self.files).remove(path);
    }
}

impl FileSystem for MemoryFs {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        if *lock(&self.failing_writes) {
            return Err(std::io::Error::other("disk full"));
        }
        lock(&self.files).insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        self.contents(path)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<(), std::io::Error> {
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }

    async fn set_executable(&self, path: &Path) -> Result<(), std::io::Error> {
        lock(&self.executable).push(path.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Replays queued replies in order. An empty queue is a provider failure.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    prompts: Arc<Mutex<Vec<(TaskKind, String)>>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            prompts: Arc::default(),
        }
    }

    pub fn push(&self, reply: Result<String, LlmError>) {
        lock(&self.replies).push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn kinds(&self) -> Vec<TaskKind> {
        lock(&self.prompts).iter().map(|(k, _)| *k).collect()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        kind: TaskKind,
        user_prompt: &str,
        _system_prompt: &str,
    ) -> Result<GatewayReply, LlmError> {
        lock(&self.prompts).push((kind, user_prompt.to_string()));
        let next = lock(&self.replies).pop_front();
        match next {
            Some(Ok(text)) => Ok(GatewayReply {
                text,
                provider: "scripted".to_string(),
                model: "scripted-model".to_string(),
                fallback_used: false,
            }),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::AllProvidersFailed {
                task_kind: kind,
                last_error: "script exhausted".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Spawner
// ---------------------------------------------------------------------------

/// Records spawned programs instead of running them.
#[derive(Clone, Default)]
pub struct RecordingSpawner {
    pub spawned: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn_detached(&self, program: &Path) -> std::io::Result<u32> {
        if self.fail {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            ));
        }
        lock(&self.spawned).push(program.to_path_buf());
        Ok(4242)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Replays queued reports; an empty queue passes.
#[derive(Clone, Default)]
pub struct ScriptedValidator {
    reports: Arc<Mutex<VecDeque<ValidationReport>>>,
    seen: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl ScriptedValidator {
    pub fn new(reports: Vec<ValidationReport>) -> Self {
        Self {
            reports: Arc::new(Mutex::new(reports.into())),
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Vec<(String, PathBuf)> {
        lock(&self.seen).clone()
    }
}

impl CapabilityValidator for ScriptedValidator {
    async fn validate(
        &self,
        name: &str,
        source_location: &Path,
    ) -> ValidationReport {
        lock(&self.seen).push((name.to_string(), source_location.to_path_buf()));
        let next = lock(&self.reports).pop_front();
        next.unwrap_or_else(|| ValidationReport::pass("mock ok"))
    }
}
