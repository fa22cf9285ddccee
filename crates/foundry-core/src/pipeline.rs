//! Build pipeline: instruction -> plan -> synthesized gaps -> ready worker.
//!
//! Strictly sequential. A gap that cannot be synthesized and validated in
//! two attempts is abandoned and the build carries on without it. Only a
//! planning failure or a failure to materialize the worker aborts.

use std::path::PathBuf;

use serde::Serialize;

use foundry_types::error::{BuildError, SynthesisError};
use foundry_types::plan::{CapabilityGap, Plan};
use foundry_types::worker::WorkerId;

use crate::fs::FileSystem;
use crate::launch::{LaunchController, ProcessSpawner};
use crate::llm::gateway::TextGenerator;
use crate::materializer::WorkerMaterializer;
use crate::planner::Planner;
use crate::registry::CapabilityRegistry;
use crate::repository::capability::CapabilityRepository;
use crate::repository::trace::TraceRepository;
use crate::repository::worker::WorkerRepository;
use crate::synthesizer::{CapabilitySynthesizer, SynthesisRequest};
use crate::validator::CapabilityValidator;

/// Synthesis attempts per gap: the first try plus one retry.
pub const MAX_SYNTHESIS_ATTEMPTS: u32 = 2;

/// Stage notifications, one per progress line.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Planning,
    Planned {
        goal: String,
        schedule_interval: u32,
        required: Vec<String>,
        gaps: Vec<String>,
    },
    Synthesizing { name: String, attempt: u32 },
    SynthesisFailed { name: String, attempt: u32, error: String },
    Validating { name: String, attempt: u32 },
    Validated { name: String, passed: bool, detail: String },
    Registered { name: String },
    Abandoned { name: String, reason: String },
    Materialized { worker_id: WorkerId, program_location: PathBuf },
    Prepared { worker_id: WorkerId, ready: bool, detail: Option<String> },
}

pub trait BuildProgress: Send + Sync {
    fn on_event(&self, event: &BuildEvent);
}

impl<F: Fn(&BuildEvent) + Send + Sync> BuildProgress for F {
    fn on_event(&self, event: &BuildEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AbandonedGap {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub plan: Plan,
    pub worker_id: WorkerId,
    pub program_location: PathBuf,
    /// Capability names bound into the worker program.
    pub capabilities: Vec<String>,
    pub synthesized: Vec<String>,
    pub abandoned: Vec<AbandonedGap>,
    /// Whether the worker reached `ready` and may be launched.
    pub ready: bool,
}

pub struct BuildPipeline<'a, G, T, F, C, V, W, S>
where
    G: TextGenerator,
    T: TraceRepository,
    F: FileSystem,
    C: CapabilityRepository,
    V: CapabilityValidator,
    W: WorkerRepository,
    S: ProcessSpawner,
{
    pub registry: &'a CapabilityRegistry<C>,
    pub planner: &'a Planner<G, T>,
    pub synthesizer: &'a CapabilitySynthesizer<G, F, T>,
    pub validator: &'a V,
    pub materializer: &'a WorkerMaterializer<W, F>,
    pub launcher: &'a LaunchController<W, F, S>,
}

impl<G, T, F, C, V, W, S> BuildPipeline<'_, G, T, F, C, V, W, S>
where
    G: TextGenerator,
    T: TraceRepository,
    F: FileSystem,
    C: CapabilityRepository,
    V: CapabilityValidator,
    W: WorkerRepository,
    S: ProcessSpawner,
{
    /// Run every stage up to and including `prepare`. Launching is left to
    /// the caller.
    pub async fn build(
        &self,
        instruction: &str,
        progress: &dyn BuildProgress,
    ) -> Result<BuildOutcome, BuildError> {
        progress.on_event(&BuildEvent::Planning);
        let plan = self.planner.plan(instruction, self.registry).await?;
        progress.on_event(&BuildEvent::Planned {
            goal: plan.goal.clone(),
            schedule_interval: plan.schedule_interval,
            required: plan.required_capabilities.clone(),
            gaps: plan.capability_gaps.iter().map(|g| g.name.clone()).collect(),
        });

        let mut synthesized = Vec::new();
        let mut abandoned = Vec::new();
        for gap in &plan.capability_gaps {
            match self.fill_gap(gap, progress).await {
                Ok(()) => synthesized.push(gap.name.clone()),
                Err(reason) => {
                    tracing::warn!(name = %gap.name, %reason, "Abandoning capability gap");
                    progress.on_event(&BuildEvent::Abandoned {
                        name: gap.name.clone(),
                        reason: reason.clone(),
                    });
                    abandoned.push(AbandonedGap {
                        name: gap.name.clone(),
                        reason,
                    });
                }
            }
        }

        let mut capabilities = plan.required_capabilities.clone();
        for name in &synthesized {
            if !capabilities.contains(name) {
                capabilities.push(name.clone());
            }
        }

        let materialized = self
            .materializer
            .materialize(&plan, instruction, &capabilities)
            .await?;
        progress.on_event(&BuildEvent::Materialized {
            worker_id: materialized.worker_id.clone(),
            program_location: materialized.program_location.clone(),
        });

        for name in &synthesized {
            self.registry
                .assign_owner(name, materialized.worker_id.as_str())
                .await;
        }

        let (ready, detail) = match self.launcher.prepare(&materialized.worker_id).await {
            Ok(_) => (true, None),
            Err(e) => {
                tracing::warn!(worker_id = %materialized.worker_id, error = %e, "Worker not ready");
                (false, Some(e.to_string()))
            }
        };
        progress.on_event(&BuildEvent::Prepared {
            worker_id: materialized.worker_id.clone(),
            ready,
            detail,
        });

        Ok(BuildOutcome {
            plan,
            worker_id: materialized.worker_id,
            program_location: materialized.program_location,
            capabilities,
            synthesized,
            abandoned,
            ready,
        })
    }

    /// Synthesize, validate and register one gap. `Err` is the reason it
    /// was abandoned.
    async fn fill_gap(&self, gap: &CapabilityGap, progress: &dyn BuildProgress) -> Result<(), String> {
        let mut previous_error: Option<String> = None;

        for attempt in 1..=MAX_SYNTHESIS_ATTEMPTS {
            progress.on_event(&BuildEvent::Synthesizing {
                name: gap.name.clone(),
                attempt,
            });

            let request = SynthesisRequest {
                name: &gap.name,
                purpose: &gap.purpose,
                attempt_number: attempt,
                previous_error: previous_error.as_deref(),
                requested_for: None,
            };

            let candidate = match self.synthesizer.synthesize(self.registry, request).await {
                Ok(candidate) => candidate,
                Err(e @ (SynthesisError::InvalidName(_) | SynthesisError::ReservedName(_))) => {
                    return Err(e.to_string());
                }
                Err(e) => {
                    progress.on_event(&BuildEvent::SynthesisFailed {
                        name: gap.name.clone(),
                        attempt,
                        error: e.to_string(),
                    });
                    previous_error = Some(e.to_string());
                    continue;
                }
            };

            progress.on_event(&BuildEvent::Validating {
                name: gap.name.clone(),
                attempt,
            });
            let report = self
                .validator
                .validate(&gap.name, &candidate.source_location)
                .await;

            self.synthesizer
                .log_attempt(
                    &request,
                    &candidate.source,
                    true,
                    Some(report.passed),
                    (!report.passed).then(|| report.error.clone()),
                )
                .await;

            progress.on_event(&BuildEvent::Validated {
                name: gap.name.clone(),
                passed: report.passed,
                detail: if report.passed {
                    report.output.clone()
                } else {
                    report.error.clone()
                },
            });

            if report.passed {
                self.registry
                    .register(&candidate.capability, &report)
                    .await
                    .map_err(|e| e.to_string())?;
                progress.on_event(&BuildEvent::Registered {
                    name: gap.name.clone(),
                });
                return Ok(());
            }

            self.registry.record_failure(&gap.name, &report).await;
            previous_error = Some(if report.error.is_empty() {
                "validation failed without an error message".to_string()
            } else {
                report.error
            });
        }

        Err(previous_error.unwrap_or_else(|| "synthesis failed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use foundry_types::capability::{CapabilityStatus, TestVerdict, ValidationReport};
    use foundry_types::worker::WorkerStatus;

    use crate::materializer::ProgramTemplate;
    use crate::testing::{
        MemoryCapabilities, MemoryFs, MemoryTrace, MemoryWorkers, RecordingSpawner,
        ScriptedGenerator, ScriptedValidator,
    };

    struct Harness {
        generator: ScriptedGenerator,
        trace: MemoryTrace,
        capabilities: MemoryCapabilities,
        workers: MemoryWorkers,
        fs: MemoryFs,
        spawner: RecordingSpawner,
        registry: CapabilityRegistry<MemoryCapabilities>,
        planner: Planner<ScriptedGenerator, MemoryTrace>,
        synthesizer: CapabilitySynthesizer<ScriptedGenerator, MemoryFs, MemoryTrace>,
        validator: ScriptedValidator,
        materializer: WorkerMaterializer<MemoryWorkers, MemoryFs>,
        launcher: LaunchController<MemoryWorkers, MemoryFs, RecordingSpawner>,
    }

    impl Harness {
        fn new(replies: Vec<String>, reports: Vec<ValidationReport>) -> Self {
            let generator = ScriptedGenerator::new(replies.into_iter().map(Ok).collect());
            let trace = MemoryTrace::default();
            let capabilities = MemoryCapabilities::default();
            let workers = MemoryWorkers::default();
            let fs = MemoryFs::default();
            let spawner = RecordingSpawner::default();
            let template = ProgramTemplate {
                launcher: PathBuf::from("/usr/bin/foundry"),
                data_dir: PathBuf::from("/data"),
            };
            Self {
                registry: CapabilityRegistry::new(capabilities.clone()),
                planner: Planner::new(generator.clone(), trace.clone()),
                synthesizer: CapabilitySynthesizer::new(
                    generator.clone(),
                    fs.clone(),
                    trace.clone(),
                    "/data/capabilities",
                    "TOOL_TEST_MODE",
                ),
                validator: ScriptedValidator::new(reports),
                materializer: WorkerMaterializer::new(workers.clone(), fs.clone(), template),
                launcher: LaunchController::new(workers.clone(), fs.clone(), spawner.clone()),
                generator,
                trace,
                capabilities,
                workers,
                fs,
                spawner,
            }
        }

        fn pipeline(
            &self,
        ) -> BuildPipeline<
            '_,
            ScriptedGenerator,
            MemoryTrace,
            MemoryFs,
            MemoryCapabilities,
            ScriptedValidator,
            MemoryWorkers,
            RecordingSpawner,
        > {
            BuildPipeline {
                registry: &self.registry,
                planner: &self.planner,
                synthesizer: &self.synthesizer,
                validator: &self.validator,
                materializer: &self.materializer,
                launcher: &self.launcher,
            }
        }
    }

    fn plan_reply(required: &str, gaps: &str, interval: u32) -> String {
        format!(
            r#"{{"system_prompt": "You are a job scout.", "goal": "Find AI engineer jobs and email the list.",
                "interval_hours": {interval}, "required_tools": {required}, "missing_tools": {gaps}}}"#
        )
    }

    fn tool_source(name: &str) -> String {
        format!("import os\n\ndef {name}(arg=None):\n    return 'ok'\n")
    }

    fn collect_events() -> (Arc<Mutex<Vec<BuildEvent>>>, impl Fn(&BuildEvent) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |e: &BuildEvent| sink.lock().unwrap().push(e.clone()))
    }

    #[tokio::test]
    async fn test_end_to_end_without_gaps() {
        let h = Harness::new(
            vec![plan_reply(r#"["web_search", "send_email"]"#, "[]", 24)],
            vec![],
        );
        let (events, progress) = collect_events();

        let outcome = h
            .pipeline()
            .build(
                "Every day, fetch the latest posts for query 'ai engineer jobs' and email me the list at test@example.com",
                &progress,
            )
            .await
            .unwrap();

        assert_eq!(outcome.plan.schedule_interval, 24);
        assert_eq!(outcome.plan.required_capabilities, vec!["web_search", "send_email"]);
        assert!(outcome.plan.capability_gaps.is_empty());
        assert_eq!(outcome.capabilities, vec!["web_search", "send_email"]);
        assert!(outcome.ready);

        let worker = h.workers.get_sync(outcome.worker_id.as_str()).unwrap();
        assert_eq!(worker.status, WorkerStatus::Ready);
        let program = h.fs.contents(&outcome.program_location).unwrap();
        assert!(program.contains("CAPABILITIES='web_search,send_email'\n"));

        h.launcher.launch(&outcome.worker_id).await.unwrap();
        let worker = h.workers.get_sync(outcome.worker_id.as_str()).unwrap();
        assert_eq!(worker.status, WorkerStatus::Running);
        assert_eq!(h.spawner.spawned.lock().unwrap().len(), 1);

        let events = events.lock().unwrap();
        assert!(matches!(events[0], BuildEvent::Planning));
        assert!(matches!(events.last(), Some(BuildEvent::Prepared { ready: true, .. })));
    }

    #[tokio::test]
    async fn test_gap_retried_with_validator_error_then_registered() {
        let h = Harness::new(
            vec![
                plan_reply(
                    r#"["send_email"]"#,
                    r#"[{"name": "rss_reader", "purpose": "Read an RSS feed"}]"#,
                    0,
                ),
                tool_source("rss_reader"),
                tool_source("rss_reader"),
            ],
            vec![
                ValidationReport::fail("ModuleNotFoundError: feedparser"),
                ValidationReport::pass("3 items"),
            ],
        );

        let outcome = h.pipeline().build("read my feed", &|_: &BuildEvent| {}).await.unwrap();

        assert_eq!(outcome.synthesized, vec!["rss_reader"]);
        assert!(outcome.abandoned.is_empty());
        assert_eq!(outcome.capabilities, vec!["send_email", "rss_reader"]);

        let prompts = h.generator.prompts();
        assert!(prompts[2].contains("Previous attempt failed with this error: ModuleNotFoundError: feedparser"));

        let stored = h.capabilities.get_sync("rss_reader").unwrap();
        assert_eq!(stored.status, CapabilityStatus::Active);
        assert_eq!(stored.test_verdict, TestVerdict::Passed);
        assert_eq!(stored.created_for.as_deref(), Some(outcome.worker_id.as_str()));

        let attempts = h.trace.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].test_passed, Some(false));
        assert_eq!(attempts[1].test_passed, Some(true));
        assert_eq!(
            h.validator.seen()[0].1,
            Path::new("/data/capabilities/rss_reader.py")
        );
    }

    #[tokio::test]
    async fn test_gap_abandoned_after_two_failures_build_continues() {
        let h = Harness::new(
            vec![
                plan_reply(
                    r#"["web_search"]"#,
                    r#"[{"name": "pdf_reader", "purpose": "Extract text from PDFs"}]"#,
                    0,
                ),
                tool_source("pdf_reader"),
                "print('no function here')".to_string(),
            ],
            vec![ValidationReport::fail("Tool execution timed out after 15 seconds")],
        );

        let outcome = h.pipeline().build("summarize pdfs", &|_: &BuildEvent| {}).await.unwrap();

        assert!(outcome.synthesized.is_empty());
        assert_eq!(outcome.abandoned.len(), 1);
        assert_eq!(outcome.abandoned[0].name, "pdf_reader");
        assert!(outcome.abandoned[0].reason.contains("does not declare"));
        assert_eq!(outcome.capabilities, vec!["web_search"]);
        assert!(outcome.ready);

        let stored = h.capabilities.get_sync("pdf_reader").unwrap();
        assert_eq!(stored.status, CapabilityStatus::Inactive);
        assert!(h.registry.snapshot().await.iter().all(|c| c.name != "pdf_reader"));
    }

    #[tokio::test]
    async fn test_planning_failure_aborts_before_materializing() {
        let h = Harness::new(vec!["nonsense".to_string(), "still nonsense".to_string()], vec![]);
        let err = h.pipeline().build("anything", &|_: &BuildEvent| {}).await.unwrap_err();
        assert!(matches!(err, BuildError::Plan(_)));
        assert!(h.workers.get_sync("worker_001").is_none());
    }
}
