//! SQLite traceability log: generation calls and synthesis attempts.
//!
//! Both tables are append-only. Nothing here updates or deletes rows.

use foundry_core::repository::trace::TraceRepository;
use foundry_types::error::RepositoryError;
use foundry_types::log::{GenerationCall, SynthesisAttempt};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

#[derive(Clone)]
pub struct SqliteTraceRepository {
    pool: DatabasePool,
}

impl SqliteTraceRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn call_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<GenerationCall, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;

    Ok(GenerationCall {
        id: parse_uuid(&id)?,
        task_kind: row.try_get("task_kind").map_err(get)?,
        provider: row.try_get("provider").map_err(get)?,
        model: row.try_get("model").map_err(get)?,
        prompt: row.try_get("prompt").map_err(get)?,
        response: row.try_get("response").map_err(get)?,
        prompt_chars: row.try_get("prompt_chars").map_err(get)?,
        response_chars: row.try_get("response_chars").map_err(get)?,
        success: row.try_get::<i64, _>("success").map_err(get)? != 0,
        fallback_used: row.try_get::<i64, _>("fallback_used").map_err(get)? != 0,
        fallback_reason: row.try_get("fallback_reason").map_err(get)?,
        duration_ms: row.try_get("duration_ms").map_err(get)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn attempt_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SynthesisAttempt, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;
    let attempt_number: i64 = row.try_get("attempt_number").map_err(get)?;
    let test_passed: Option<i64> = row.try_get("test_passed").map_err(get)?;

    Ok(SynthesisAttempt {
        id: parse_uuid(&id)?,
        capability_name: row.try_get("capability_name").map_err(get)?,
        requested_for: row.try_get("requested_for").map_err(get)?,
        attempt_number: u32::try_from(attempt_number)
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        purpose: row.try_get("purpose").map_err(get)?,
        source: row.try_get("source").map_err(get)?,
        accepted: row.try_get::<i64, _>("accepted").map_err(get)? != 0,
        test_passed: test_passed.map(|v| v != 0),
        error: row.try_get("error").map_err(get)?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl TraceRepository for SqliteTraceRepository {
    async fn record_generation_call(&self, call: &GenerationCall) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO generation_calls (id, task_kind, provider, model, prompt, response, prompt_chars, response_chars, success, fallback_used, fallback_reason, duration_ms, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(call.id.to_string())
        .bind(&call.task_kind)
        .bind(&call.provider)
        .bind(&call.model)
        .bind(&call.prompt)
        .bind(&call.response)
        .bind(call.prompt_chars)
        .bind(call.response_chars)
        .bind(call.success as i64)
        .bind(call.fallback_used as i64)
        .bind(&call.fallback_reason)
        .bind(call.duration_ms)
        .bind(format_datetime(&call.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn record_synthesis_attempt(&self, attempt: &SynthesisAttempt) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO synthesis_attempts (id, capability_name, requested_for, attempt_number, purpose, source, accepted, test_passed, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.id.to_string())
        .bind(&attempt.capability_name)
        .bind(&attempt.requested_for)
        .bind(i64::from(attempt.attempt_number))
        .bind(&attempt.purpose)
        .bind(&attempt.source)
        .bind(attempt.accepted as i64)
        .bind(attempt.test_passed.map(|v| v as i64))
        .bind(&attempt.error)
        .bind(format_datetime(&attempt.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn recent_generation_calls(&self, limit: i64) -> Result<Vec<GenerationCall>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM generation_calls ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(call_from_row).collect()
    }

    async fn synthesis_attempts_for(
        &self,
        capability_name: &str,
    ) -> Result<Vec<SynthesisAttempt>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM synthesis_attempts WHERE capability_name = ? ORDER BY created_at ASC, attempt_number ASC",
        )
        .bind(capability_name)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(attempt_from_row).collect()
    }
}
