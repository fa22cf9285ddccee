//! Worker runtime: what a launched worker program does.
//!
//! A run asks the gateway for one step at a time. Each reply is either a
//! tool call, answered with the tool's output as the next observation, or
//! a final answer. Every run produces exactly one [`RunRecord`] and bumps
//! the worker's run counter, whatever the outcome.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use foundry_types::capability::Capability;
use foundry_types::llm::TaskKind;
use foundry_types::worker::{RunOutcome, RunRecord, WorkerId, WorkerStatus, excerpt};

use crate::llm::gateway::TextGenerator;
use crate::planner::extract_json_object;
use crate::registry::{CapabilityRegistry, listing_of};
use crate::repository::capability::CapabilityRepository;
use crate::repository::worker::{RunRepository, WorkerRepository};

/// Executes one capability. Failures come back as text for the model to read.
pub trait CapabilityInvoker: Send + Sync {
    fn invoke(
        &self,
        capability: &Capability,
        input: &Value,
    ) -> impl std::future::Future<Output = String> + Send;
}

/// The wiring embedded in a worker program.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub id: WorkerId,
    pub role_text: String,
    pub goal: String,
    pub interval_hours: u32,
    pub capabilities: Vec<Capability>,
}

impl WorkerSpec {
    /// Resolve capability names through the registry. Unknown or inactive
    /// names are dropped with a warning.
    pub async fn bind<R: CapabilityRepository>(
        id: WorkerId,
        role_text: String,
        goal: String,
        interval_hours: u32,
        names: &[String],
        registry: &CapabilityRegistry<R>,
    ) -> Self {
        let mut capabilities = Vec::with_capacity(names.len());
        for name in names {
            match registry.lookup(name).await {
                Some(cap) if cap.is_active() => capabilities.push(cap),
                Some(_) => tracing::warn!(%name, "Capability is inactive, not binding it"),
                None => tracing::warn!(%name, "Capability not found, not binding it"),
            }
        }
        Self {
            id,
            role_text,
            goal,
            interval_hours,
            capabilities,
        }
    }
}

/// One parsed model reply.
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Tool { name: String, input: Value },
    Final(String),
}

pub struct WorkerRuntime<G, W, R, I>
where
    G: TextGenerator,
    W: WorkerRepository,
    R: RunRepository,
    I: CapabilityInvoker,
{
    generator: G,
    workers: W,
    runs: R,
    invoker: I,
    max_steps: u32,
}

impl<G, W, R, I> WorkerRuntime<G, W, R, I>
where
    G: TextGenerator,
    W: WorkerRepository,
    R: RunRepository,
    I: CapabilityInvoker,
{
    pub fn new(generator: G, workers: W, runs: R, invoker: I, max_steps: u32) -> Self {
        Self {
            generator,
            workers,
            runs,
            invoker,
            max_steps: max_steps.max(1),
        }
    }

    /// Run now, then every `interval_hours` until `shutdown` fires. A zero
    /// interval runs once. Returns the terminal status written on exit.
    pub async fn run(&self, spec: &WorkerSpec, shutdown: CancellationToken) -> WorkerStatus {
        self.mark_running(&spec.id).await;
        let period = Duration::from_secs(u64::from(spec.interval_hours) * 3600);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(worker_id = %spec.id, "Shutdown requested during run");
                    break;
                }
                record = self.run_once(spec) => {
                    tracing::info!(
                        worker_id = %spec.id,
                        run_number = record.run_number,
                        outcome = %record.outcome,
                        "Run finished"
                    );
                }
            }

            if spec.interval_hours == 0 {
                break;
            }

            tracing::info!(worker_id = %spec.id, hours = spec.interval_hours, "Sleeping until next run");
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(worker_id = %spec.id, "Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(period) => {}
            }
        }

        self.finish(&spec.id, WorkerStatus::Stopped).await
    }

    /// Execute the goal once and record the run.
    pub async fn run_once(&self, spec: &WorkerSpec) -> RunRecord {
        let run_count = match self.workers.get(&spec.id).await {
            Ok(Some(worker)) => worker.run_count,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, worker_id = %spec.id, "Run count unavailable, assuming 0");
                0
            }
        };
        let run_number = run_count + 1;

        let started_at = Utc::now();
        let result = self.execute(spec).await;
        let completed_at = Utc::now();

        let record = match result {
            Ok(text) => RunRecord {
                worker_id: spec.id.clone(),
                run_number,
                started_at,
                completed_at,
                outcome: RunOutcome::Success,
                result_excerpt: excerpt(&text, RunRecord::RESULT_LIMIT),
                error_excerpt: None,
            },
            Err(error) => {
                tracing::warn!(worker_id = %spec.id, run_number, %error, "Run failed");
                RunRecord {
                    worker_id: spec.id.clone(),
                    run_number,
                    started_at,
                    completed_at,
                    outcome: RunOutcome::Failed,
                    result_excerpt: String::new(),
                    error_excerpt: Some(excerpt(&error, RunRecord::ERROR_LIMIT)),
                }
            }
        };

        if let Err(e) = self.runs.insert(&record).await {
            tracing::warn!(error = %e, worker_id = %spec.id, "Failed to store run record");
        }
        if let Err(e) = self
            .workers
            .record_run(&spec.id, run_number, completed_at)
            .await
        {
            tracing::warn!(error = %e, worker_id = %spec.id, "Failed to update run count");
        }

        record
    }

    /// The bounded tool-use loop. `Err` carries a human-readable reason.
    pub async fn execute(&self, spec: &WorkerSpec) -> Result<String, String> {
        let system = system_prompt(spec);
        let mut transcript = String::new();

        for step in 1..=self.max_steps {
            let prompt = user_prompt(&spec.goal, &transcript);
            let reply = self
                .generator
                .generate(TaskKind::AgentStep, &prompt, &system)
                .await
                .map_err(|e| e.to_string())?;

            match parse_step(&reply.text) {
                Step::Final(answer) => return Ok(answer),
                Step::Tool { name, input } => {
                    tracing::debug!(worker_id = %spec.id, step, tool = %name, "Tool call");
                    let observation = match spec.capabilities.iter().find(|c| c.name == name) {
                        Some(capability) => self.invoker.invoke(capability, &input).await,
                        None => format!("Error: tool '{name}' is not available to this worker"),
                    };
                    transcript.push_str(&format!(
                        "Step {step}: called {name} with {input}\nObservation: {observation}\n\n"
                    ));
                }
            }
        }

        Err(format!(
            "no final answer after {} steps",
            self.max_steps
        ))
    }

    async fn mark_running(&self, id: &WorkerId) {
        match self.workers.get(id).await {
            Ok(Some(worker)) if worker.status.can_transition_to(WorkerStatus::Running) => {
                if let Err(e) = self.workers.update_status(id, WorkerStatus::Running).await {
                    tracing::warn!(error = %e, worker_id = %id, "Failed to mark worker running");
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, worker_id = %id, "Worker record unavailable"),
        }
    }

    /// Write a terminal status if the transition is legal.
    pub async fn finish(&self, id: &WorkerId, status: WorkerStatus) -> WorkerStatus {
        match self.workers.get(id).await {
            Ok(Some(worker)) if worker.status.can_transition_to(status) => {
                if let Err(e) = self.workers.update_status(id, status).await {
                    tracing::warn!(error = %e, worker_id = %id, "Failed to record final status");
                }
            }
            Ok(Some(worker)) => {
                tracing::debug!(worker_id = %id, from = %worker.status, to = %status, "Skipping status change");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, worker_id = %id, "Worker record unavailable"),
        }
        status
    }
}

fn system_prompt(spec: &WorkerSpec) -> String {
    let tools = if spec.capabilities.is_empty() {
        "(none)".to_string()
    } else {
        listing_of(&spec.capabilities)
    };
    format!(
        r#"{role}

You can use these tools:
{tools}

Reply with exactly one JSON object per message:
- to call a tool: {{"tool": "<tool name>", "input": <string or object>}}
- when the goal is complete: {{"final": "<your answer>"}}"#,
        role = spec.role_text,
    )
}

fn user_prompt(goal: &str, transcript: &str) -> String {
    if transcript.is_empty() {
        format!("Goal: {goal}")
    } else {
        format!("Goal: {goal}\n\nProgress so far:\n{transcript}What is the next step?")
    }
}

/// Interpret a model reply. Anything that is not a recognizable tool call
/// is the final answer.
fn parse_step(text: &str) -> Step {
    let parsed = extract_json_object(text).and_then(|json| serde_json::from_str::<Value>(json).ok());
    let Some(Value::Object(object)) = parsed else {
        return Step::Final(text.trim().to_string());
    };

    if let Some(tool) = object.get("tool").and_then(Value::as_str) {
        let input = object.get("input").cloned().unwrap_or(Value::Null);
        return Step::Tool {
            name: tool.trim().to_string(),
            input,
        };
    }

    match object.get("final") {
        Some(Value::String(s)) => Step::Final(s.clone()),
        Some(other) => Step::Final(other.to_string()),
        None => Step::Final(text.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use foundry_types::llm::LlmError;
    use foundry_types::worker::Worker;

    use crate::testing::{MemoryCapabilities, MemoryRuns, MemoryWorkers, ScriptedGenerator};

    #[derive(Clone, Default)]
    struct EchoInvoker {
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl CapabilityInvoker for EchoInvoker {
        async fn invoke(&self, capability: &Capability, input: &Value) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((capability.name.clone(), input.clone()));
            format!("{} says ok", capability.name)
        }
    }

    fn worker(run_count: i64, status: WorkerStatus) -> Worker {
        Worker {
            id: WorkerId::from_sequence(1),
            instruction: "x".to_string(),
            role_text: "You are a scout.".to_string(),
            goal: "Find things.".to_string(),
            capabilities: vec!["web_search".to_string()],
            schedule_interval: 0,
            program_location: "/data/workers/worker_001.sh".to_string(),
            status,
            run_count,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    async fn spec(interval_hours: u32) -> WorkerSpec {
        let registry = CapabilityRegistry::new(MemoryCapabilities::default());
        WorkerSpec::bind(
            WorkerId::from_sequence(1),
            "You are a scout.".to_string(),
            "Find things.".to_string(),
            interval_hours,
            &["web_search".to_string(), "nonexistent".to_string()],
            &registry,
        )
        .await
    }

    type Runtime = WorkerRuntime<ScriptedGenerator, MemoryWorkers, MemoryRuns, EchoInvoker>;

    fn runtime(
        generator: ScriptedGenerator,
        workers: MemoryWorkers,
        runs: MemoryRuns,
        invoker: EchoInvoker,
    ) -> Runtime {
        WorkerRuntime::new(generator, workers, runs, invoker, 3)
    }

    #[test]
    fn test_parse_step() {
        assert_eq!(
            parse_step(r#"{"tool": "web_search", "input": {"query": "rust"}}"#),
            Step::Tool {
                name: "web_search".to_string(),
                input: serde_json::json!({"query": "rust"}),
            }
        );
        assert_eq!(parse_step(r#"{"final": "done"}"#), Step::Final("done".to_string()));
        assert_eq!(parse_step("just text"), Step::Final("just text".to_string()));
    }

    #[tokio::test]
    async fn test_bind_drops_unknown_capabilities() {
        let spec = spec(0).await;
        let names: Vec<_> = spec.capabilities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web_search"]);
    }

    #[tokio::test]
    async fn test_run_numbering_continues_from_run_count() {
        let workers = MemoryWorkers::default();
        workers.put(worker(3, WorkerStatus::Running));
        let runs = MemoryRuns::default();
        let rt = runtime(
            ScriptedGenerator::new(vec![Ok(r#"{"final": "all done"}"#.to_string())]),
            workers.clone(),
            runs.clone(),
            EchoInvoker::default(),
        );

        let record = rt.run_once(&spec(0).await).await;
        assert_eq!(record.run_number, 4);
        assert_eq!(record.outcome, RunOutcome::Success);
        assert_eq!(workers.get_sync("worker_001").unwrap().run_count, 4);
        assert_eq!(runs.all().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_still_advances_run_count() {
        let workers = MemoryWorkers::default();
        workers.put(worker(3, WorkerStatus::Running));
        let runs = MemoryRuns::default();
        let rt = runtime(
            ScriptedGenerator::new(vec![Err(LlmError::AuthenticationFailed)]),
            workers.clone(),
            runs.clone(),
            EchoInvoker::default(),
        );

        let record = rt.run_once(&spec(0).await).await;
        assert_eq!(record.run_number, 4);
        assert_eq!(record.outcome, RunOutcome::Failed);
        assert!(record.error_excerpt.unwrap().contains("authentication"));
        let saved = workers.get_sync("worker_001").unwrap();
        assert_eq!(saved.run_count, 4);
        assert!(saved.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_tool_loop_invokes_bound_capability() {
        let invoker = EchoInvoker::default();
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"tool": "web_search", "input": {"query": "ai jobs"}}"#.to_string()),
            Ok(r#"{"final": "found 5 jobs"}"#.to_string()),
        ]);
        let rt = runtime(
            generator.clone(),
            MemoryWorkers::default(),
            MemoryRuns::default(),
            invoker.clone(),
        );

        let answer = rt.execute(&spec(0).await).await.unwrap();
        assert_eq!(answer, "found 5 jobs");
        assert_eq!(invoker.calls.lock().unwrap()[0].0, "web_search");
        assert!(generator.prompts()[1].contains("Observation: web_search says ok"));
        assert!(generator.kinds().iter().all(|k| *k == TaskKind::AgentStep));
    }

    #[tokio::test]
    async fn test_unbound_tool_gets_error_observation() {
        let invoker = EchoInvoker::default();
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"tool": "send_email", "input": {}}"#.to_string()),
            Ok(r#"{"final": "gave up"}"#.to_string()),
        ]);
        let rt = runtime(
            generator.clone(),
            MemoryWorkers::default(),
            MemoryRuns::default(),
            invoker.clone(),
        );

        rt.execute(&spec(0).await).await.unwrap();
        assert!(invoker.calls.lock().unwrap().is_empty());
        assert!(generator.prompts()[1].contains("not available to this worker"));
    }

    #[tokio::test]
    async fn test_step_limit_fails_the_run() {
        let call = r#"{"tool": "web_search", "input": "x"}"#.to_string();
        let rt = runtime(
            ScriptedGenerator::new(vec![Ok(call.clone()), Ok(call.clone()), Ok(call)]),
            MemoryWorkers::default(),
            MemoryRuns::default(),
            EchoInvoker::default(),
        );
        let err = rt.execute(&spec(0).await).await.unwrap_err();
        assert!(err.contains("3 steps"));
    }

    #[tokio::test]
    async fn test_one_shot_run_stops_worker() {
        let workers = MemoryWorkers::default();
        workers.put(worker(0, WorkerStatus::Running));
        let rt = runtime(
            ScriptedGenerator::new(vec![Ok("done".to_string())]),
            workers.clone(),
            MemoryRuns::default(),
            EchoInvoker::default(),
        );

        let status = rt.run(&spec(0).await, CancellationToken::new()).await;
        assert_eq!(status, WorkerStatus::Stopped);
        let saved = workers.get_sync("worker_001").unwrap();
        assert_eq!(saved.status, WorkerStatus::Stopped);
        assert_eq!(saved.run_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_worker_runs_until_shutdown() {
        let workers = MemoryWorkers::default();
        workers.put(worker(0, WorkerStatus::Running));
        let runs = MemoryRuns::default();
        let generator = ScriptedGenerator::new(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
        ]);
        let rt = Arc::new(runtime(
            generator,
            workers.clone(),
            runs.clone(),
            EchoInvoker::default(),
        ));

        let shutdown = CancellationToken::new();
        let spec = spec(1).await;
        let handle = {
            let rt = rt.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { rt.run(&spec, shutdown).await })
        };

        // Paused clock: advancing past one interval triggers the second run.
        tokio::time::sleep(Duration::from_secs(3600 + 1)).await;
        shutdown.cancel();
        let status = handle.await.unwrap();

        assert_eq!(status, WorkerStatus::Stopped);
        assert_eq!(runs.all().len(), 2);
        assert_eq!(workers.get_sync("worker_001").unwrap().run_count, 2);
    }
}
