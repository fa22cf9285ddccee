//! Launch controller: `starting -> ready -> running`.
//!
//! Status lives only in the store. Once `launch` returns a pid the worker
//! process is on its own; nothing here can stop it.

use std::path::{Path, PathBuf};

use foundry_types::error::LaunchError;
use foundry_types::worker::{Worker, WorkerId, WorkerStatus};

use crate::fs::FileSystem;
use crate::repository::worker::WorkerRepository;

/// Starts a program as a detached process and returns its pid.
pub trait ProcessSpawner: Send + Sync {
    fn spawn_detached(&self, program: &Path) -> std::io::Result<u32>;
}

pub struct LaunchController<W: WorkerRepository, F: FileSystem, S: ProcessSpawner> {
    workers: W,
    fs: F,
    spawner: S,
}

impl<W: WorkerRepository, F: FileSystem, S: ProcessSpawner> LaunchController<W, F, S> {
    pub fn new(workers: W, fs: F, spawner: S) -> Self {
        Self {
            workers,
            fs,
            spawner,
        }
    }

    /// Check the program exists and flag the worker `ready`.
    /// Preparing an already ready worker is a no-op.
    pub async fn prepare(&self, id: &WorkerId) -> Result<Worker, LaunchError> {
        let mut worker = self.load_with_program(id).await?;

        match worker.status {
            WorkerStatus::Ready => return Ok(worker),
            WorkerStatus::Starting => {}
            other => return Err(wrong_status(id, other, WorkerStatus::Ready)),
        }

        self.set_status(id, worker.status, WorkerStatus::Ready).await?;
        worker.status = WorkerStatus::Ready;

        tracing::info!(worker_id = %id, "Worker ready");
        Ok(worker)
    }

    /// `launch(worker_id)`: mark `running`, then spawn detached.
    ///
    /// Refuses unless the program exists and the worker is `ready`. A
    /// storage failure while marking `running` aborts before spawning. If
    /// the spawn itself fails the worker is marked `failed`.
    pub async fn launch(&self, id: &WorkerId) -> Result<u32, LaunchError> {
        let worker = self.load_with_program(id).await?;
        if worker.status != WorkerStatus::Ready {
            return Err(wrong_status(id, worker.status, WorkerStatus::Ready));
        }

        self.set_status(id, worker.status, WorkerStatus::Running).await?;

        let program = PathBuf::from(&worker.program_location);
        match self.spawner.spawn_detached(&program) {
            Ok(pid) => {
                tracing::info!(worker_id = %id, pid, "Worker launched");
                Ok(pid)
            }
            Err(e) => {
                tracing::error!(worker_id = %id, error = %e, "Worker spawn failed");
                if let Err(se) = self
                    .set_status(id, WorkerStatus::Running, WorkerStatus::Failed)
                    .await
                {
                    tracing::warn!(error = %se, worker_id = %id, "Failed to mark worker failed");
                }
                Err(LaunchError::Spawn(e.to_string()))
            }
        }
    }

    /// The only status write path; refuses transitions the lifecycle forbids.
    async fn set_status(
        &self,
        id: &WorkerId,
        from: WorkerStatus,
        to: WorkerStatus,
    ) -> Result<(), LaunchError> {
        if !from.can_transition_to(to) {
            return Err(wrong_status(id, from, to));
        }
        self.workers
            .update_status(id, to)
            .await
            .map_err(|e| LaunchError::Storage(e.to_string()))
    }

    async fn load_with_program(&self, id: &WorkerId) -> Result<Worker, LaunchError> {
        let worker = self
            .workers
            .get(id)
            .await
            .map_err(|e| LaunchError::Storage(e.to_string()))?
            .ok_or_else(|| LaunchError::NotFound(id.to_string()))?;

        if !self.fs.exists(Path::new(&worker.program_location)).await {
            return Err(LaunchError::ProgramMissing(worker.program_location));
        }
        Ok(worker)
    }
}

fn wrong_status(id: &WorkerId, status: WorkerStatus, expected: WorkerStatus) -> LaunchError {
    LaunchError::WrongStatus {
        id: id.to_string(),
        status: status.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{MemoryFs, MemoryWorkers, RecordingSpawner};

    fn worker(status: WorkerStatus) -> Worker {
        Worker {
            id: WorkerId::from_sequence(1),
            instruction: "do it".to_string(),
            role_text: "You are a tester.".to_string(),
            goal: "Test.".to_string(),
            capabilities: vec![],
            schedule_interval: 0,
            program_location: "/data/workers/worker_001.sh".to_string(),
            status,
            run_count: 0,
            last_run_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    async fn setup(
        status: WorkerStatus,
        with_program: bool,
        spawner: RecordingSpawner,
    ) -> (LaunchController<MemoryWorkers, MemoryFs, RecordingSpawner>, MemoryWorkers) {
        let workers = MemoryWorkers::default();
        workers.put(worker(status));
        let fs = MemoryFs::default();
        if with_program {
            fs.write_file(Path::new("/data/workers/worker_001.sh"), "#!/bin/sh\n")
                .await
                .unwrap();
        }
        (LaunchController::new(workers.clone(), fs, spawner), workers)
    }

    fn id() -> WorkerId {
        WorkerId::from_sequence(1)
    }

    #[tokio::test]
    async fn test_prepare_then_launch() {
        let spawner = RecordingSpawner::default();
        let (controller, workers) = setup(WorkerStatus::Starting, true, spawner.clone()).await;

        controller.prepare(&id()).await.unwrap();
        assert_eq!(workers.get_sync("worker_001").unwrap().status, WorkerStatus::Ready);

        let pid = controller.launch(&id()).await.unwrap();
        assert_eq!(pid, 4242);
        assert_eq!(workers.get_sync("worker_001").unwrap().status, WorkerStatus::Running);
        assert_eq!(spawner.spawned.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_refuses_starting_worker() {
        let spawner = RecordingSpawner::default();
        let (controller, _) = setup(WorkerStatus::Starting, true, spawner.clone()).await;

        let err = controller.launch(&id()).await.unwrap_err();
        assert!(matches!(err, LaunchError::WrongStatus { .. }));
        assert!(spawner.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_program_refuses_prepare_and_launch() {
        let spawner = RecordingSpawner::default();
        let (controller, _) = setup(WorkerStatus::Ready, false, spawner.clone()).await;

        assert!(matches!(
            controller.prepare(&id()).await,
            Err(LaunchError::ProgramMissing(_))
        ));
        assert!(matches!(
            controller.launch(&id()).await,
            Err(LaunchError::ProgramMissing(_))
        ));
        assert!(spawner.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_before_spawn() {
        let spawner = RecordingSpawner::default();
        let (controller, workers) = setup(WorkerStatus::Ready, true, spawner.clone()).await;
        workers.set_failing_status(true);

        let err = controller.launch(&id()).await.unwrap_err();
        assert!(matches!(err, LaunchError::Storage(_)));
        assert!(spawner.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_marks_failed() {
        let spawner = RecordingSpawner {
            fail: true,
            ..Default::default()
        };
        let (controller, workers) = setup(WorkerStatus::Ready, true, spawner).await;

        let err = controller.launch(&id()).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
        assert_eq!(workers.get_sync("worker_001").unwrap().status, WorkerStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_worker() {
        let (controller, _) = setup(WorkerStatus::Ready, true, RecordingSpawner::default()).await;
        let err = controller.launch(&WorkerId::from_sequence(9)).await.unwrap_err();
        assert!(matches!(err, LaunchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_running_worker_cannot_be_prepared() {
        let (controller, _) = setup(WorkerStatus::Running, true, RecordingSpawner::default()).await;
        assert!(matches!(
            controller.prepare(&id()).await,
            Err(LaunchError::WrongStatus { .. })
        ));
    }
}
