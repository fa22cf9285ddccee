//! Worker materializer: plan -> worker record + executable program.
//!
//! The program is a small POSIX shell script with the worker's wiring
//! embedded as constants. It execs the foundry binary's hidden
//! `worker run` entry point, which owns the run/record/reschedule loop.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use foundry_types::error::{MaterializeError, RepositoryError};
use foundry_types::plan::Plan;
use foundry_types::worker::{Worker, WorkerId, WorkerStatus};

use crate::fs::FileSystem;
use crate::repository::worker::WorkerRepository;

/// Upper bound on id conflicts tolerated before giving up.
const MAX_ID_ATTEMPTS: u32 = 32;

const INSTRUCTION_HEADER_LIMIT: usize = 200;

/// Where programs go and what they exec.
#[derive(Debug, Clone)]
pub struct ProgramTemplate {
    /// Absolute path of the foundry binary.
    pub launcher: PathBuf,
    /// Data directory exported to the worker process.
    pub data_dir: PathBuf,
}

impl ProgramTemplate {
    pub fn workers_dir(&self) -> PathBuf {
        self.data_dir.join("workers")
    }

    pub fn program_path(&self, id: &WorkerId) -> PathBuf {
        self.workers_dir().join(format!("{id}.sh"))
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedWorker {
    pub worker_id: WorkerId,
    pub program_location: PathBuf,
}

pub struct WorkerMaterializer<W: WorkerRepository, F: FileSystem> {
    workers: W,
    fs: F,
    template: ProgramTemplate,
}

impl<W: WorkerRepository, F: FileSystem> WorkerMaterializer<W, F> {
    pub fn new(workers: W, fs: F, template: ProgramTemplate) -> Self {
        Self {
            workers,
            fs,
            template,
        }
    }

    /// Allocate an id, save the worker as `starting`, and write its program.
    /// The program is not executed. If the program cannot be written the
    /// record stays `starting`; a later `prepare` refuses it until the
    /// program exists.
    pub async fn materialize(
        &self,
        plan: &Plan,
        instruction: &str,
        capabilities: &[String],
    ) -> Result<MaterializedWorker, MaterializeError> {
        if plan.goal.trim().is_empty() {
            return Err(MaterializeError::EmptyGoal);
        }

        let worker = self.save(plan, instruction, capabilities).await?;
        let program_location = PathBuf::from(&worker.program_location);
        let program = render_program(&worker, &self.template);

        if let Err(e) = self.write_program(&program_location, &program).await {
            tracing::error!(
                worker_id = %worker.id,
                path = %program_location.display(),
                error = %e,
                "Worker program write failed"
            );
            return Err(MaterializeError::Program(e.to_string()));
        }

        tracing::info!(
            worker_id = %worker.id,
            path = %program_location.display(),
            capabilities = ?capabilities,
            "Worker materialized"
        );

        Ok(MaterializedWorker {
            worker_id: worker.id,
            program_location,
        })
    }

    /// Insert the worker record, advancing the sequence past taken ids.
    async fn save(
        &self,
        plan: &Plan,
        instruction: &str,
        capabilities: &[String],
    ) -> Result<Worker, MaterializeError> {
        let count = self.workers.count().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Worker count unavailable, starting from 0");
            0
        });

        let now = Utc::now();
        for offset in 0..u64::from(MAX_ID_ATTEMPTS) {
            let id = WorkerId::from_sequence(count + 1 + offset);
            let worker = Worker {
                program_location: self.template.program_path(&id).to_string_lossy().to_string(),
                id,
                instruction: instruction.to_string(),
                role_text: plan.role_text.clone(),
                goal: plan.goal.clone(),
                capabilities: capabilities.to_vec(),
                schedule_interval: plan.schedule_interval,
                status: WorkerStatus::Starting,
                run_count: 0,
                last_run_at: None,
                created_at: now,
            };

            match self.workers.insert(&worker).await {
                Ok(()) => return Ok(worker),
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(worker_id = %worker.id, "Worker id taken, advancing");
                }
                Err(e) => {
                    tracing::warn!(error = %e, worker_id = %worker.id, "Failed to save worker record");
                    return Ok(worker);
                }
            }
        }

        Err(MaterializeError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    async fn write_program(&self, path: &Path, program: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        self.fs.write_file(path, program).await?;
        self.fs.set_executable(path).await
    }
}

/// Render the worker program. Pure: same worker and template, same text.
pub fn render_program(worker: &Worker, template: &ProgramTemplate) -> String {
    let instruction: String = worker
        .instruction
        .chars()
        .take(INSTRUCTION_HEADER_LIMIT)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    format!(
        "#!/bin/sh\n\
         # Worker: {id}\n\
         # Created: {created}\n\
         # Instruction: {instruction}\n\
         \n\
         WORKER_ID={worker_id}\n\
         ROLE_TEXT={role}\n\
         GOAL={goal}\n\
         INTERVAL_HOURS={interval}\n\
         CAPABILITIES={caps}\n\
         \n\
         FOUNDRY_DATA_DIR={data_dir}\n\
         export FOUNDRY_DATA_DIR\n\
         \n\
         exec {launcher} worker run \"$WORKER_ID\" \\\n\
         \x20   --role \"$ROLE_TEXT\" \\\n\
         \x20   --goal \"$GOAL\" \\\n\
         \x20   --interval-hours \"$INTERVAL_HOURS\" \\\n\
         \x20   --capabilities \"$CAPABILITIES\"\n",
        id = worker.id,
        created = format_created(worker.created_at),
        worker_id = shell_quote(worker.id.as_str()),
        role = shell_quote(&worker.role_text),
        goal = shell_quote(&worker.goal),
        interval = worker.schedule_interval,
        caps = shell_quote(&worker.capabilities.join(",")),
        data_dir = shell_quote(&template.data_dir.to_string_lossy()),
        launcher = shell_quote(&template.launcher.to_string_lossy()),
    )
}

fn format_created(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Single-quote `value` for POSIX sh.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
