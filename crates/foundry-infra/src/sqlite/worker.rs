//! SQLite worker and run-record repository implementations.

use chrono::{DateTime, Utc};
use foundry_core::repository::worker::{RunRepository, WorkerRepository};
use foundry_types::error::RepositoryError;
use foundry_types::worker::{RunRecord, Worker, WorkerId, WorkerStatus};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `WorkerRepository`.
#[derive(Clone)]
pub struct SqliteWorkerRepository {
    pool: DatabasePool,
}

impl SqliteWorkerRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to Worker domain objects.
struct WorkerRow {
    id: String,
    instruction: String,
    role_text: String,
    goal: String,
    capabilities: String,
    schedule_interval: i64,
    program_location: String,
    status: String,
    run_count: i64,
    last_run_at: Option<String>,
    created_at: String,
}

impl WorkerRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            instruction: row.try_get("instruction")?,
            role_text: row.try_get("role_text")?,
            goal: row.try_get("goal")?,
            capabilities: row.try_get("capabilities")?,
            schedule_interval: row.try_get("schedule_interval")?,
            program_location: row.try_get("program_location")?,
            status: row.try_get("status")?,
            run_count: row.try_get("run_count")?,
            last_run_at: row.try_get("last_run_at")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_worker(self) -> Result<Worker, RepositoryError> {
        let capabilities: Vec<String> = serde_json::from_str(&self.capabilities)
            .map_err(|e| RepositoryError::Query(format!("invalid capabilities JSON: {e}")))?;
        let schedule_interval = u32::try_from(self.schedule_interval)
            .map_err(|e| RepositoryError::Query(format!("invalid schedule interval: {e}")))?;

        Ok(Worker {
            id: WorkerId(self.id),
            instruction: self.instruction,
            role_text: self.role_text,
            goal: self.goal,
            capabilities,
            schedule_interval,
            program_location: self.program_location,
            status: self.status.parse().map_err(RepositoryError::Query)?,
            run_count: self.run_count,
            last_run_at: self.last_run_at.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl WorkerRepository for SqliteWorkerRepository {
    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM workers")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(total.max(0) as u64)
    }

    async fn insert(&self, worker: &Worker) -> Result<(), RepositoryError> {
        let capabilities_json = serde_json::to_string(&worker.capabilities)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO workers (id, instruction, role_text, goal, capabilities, schedule_interval, program_location, status, run_count, last_run_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(worker.id.as_str())
        .bind(&worker.instruction)
        .bind(&worker.role_text)
        .bind(&worker.goal)
        .bind(&capabilities_json)
        .bind(i64::from(worker.schedule_interval))
        .bind(&worker.program_location)
        .bind(worker.status.to_string())
        .bind(worker.run_count)
        .bind(worker.last_run_at.as_ref().map(format_datetime))
        .bind(format_datetime(&worker.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("worker '{}' already exists", worker.id)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, id: &WorkerId) -> Result<Option<Worker>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let worker_row =
                    WorkerRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(worker_row.into_worker()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Worker>, RepositoryError> {
        // worker_1000 sorts after worker_999
        let rows = sqlx::query("SELECT * FROM workers ORDER BY length(id), id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut workers = Vec::with_capacity(rows.len());
        for row in &rows {
            let worker_row =
                WorkerRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            workers.push(worker_row.into_worker()?);
        }
        Ok(workers)
    }

    async fn update_status(&self, id: &WorkerId, status: WorkerStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE workers SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn record_run(
        &self,
        id: &WorkerId,
        run_count: i64,
        last_run_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE workers SET run_count = ?, last_run_at = ? WHERE id = ?")
            .bind(run_count)
            .bind(format_datetime(&last_run_at))
            .bind(id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// SQLite-backed implementation of `RunRepository`.
#[derive(Clone)]
pub struct SqliteRunRepository {
    pool: DatabasePool,
}

impl SqliteRunRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct RunRow {
    worker_id: String,
    run_number: i64,
    started_at: String,
    completed_at: String,
    outcome: String,
    result_excerpt: String,
    error_excerpt: Option<String>,
}

impl RunRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            worker_id: row.try_get("worker_id")?,
            run_number: row.try_get("run_number")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            outcome: row.try_get("outcome")?,
            result_excerpt: row.try_get("result_excerpt")?,
            error_excerpt: row.try_get("error_excerpt")?,
        })
    }

    fn into_record(self) -> Result<RunRecord, RepositoryError> {
        Ok(RunRecord {
            worker_id: WorkerId(self.worker_id),
            run_number: self.run_number,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: parse_datetime(&self.completed_at)?,
            outcome: self.outcome.parse().map_err(RepositoryError::Query)?,
            result_excerpt: self.result_excerpt,
            error_excerpt: self.error_excerpt,
        })
    }
}

impl RunRepository for SqliteRunRepository {
    async fn insert(&self, record: &RunRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO run_records (worker_id, run_number, started_at, completed_at, outcome, result_excerpt, error_excerpt)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.worker_id.as_str())
        .bind(record.run_number)
        .bind(format_datetime(&record.started_at))
        .bind(format_datetime(&record.completed_at))
        .bind(record.outcome.to_string())
        .bind(&record.result_excerpt)
        .bind(&record.error_excerpt)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_for_worker(&self, id: &WorkerId, limit: i64) -> Result<Vec<RunRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM run_records WHERE worker_id = ? ORDER BY run_number DESC, id DESC LIMIT ?",
        )
        .bind(id.as_str())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                RunRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_record()
            })
            .collect()
    }
}
