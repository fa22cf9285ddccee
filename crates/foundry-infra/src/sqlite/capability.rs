//! SQLite capability repository implementation.

use foundry_core::repository::capability::CapabilityRepository;
use foundry_types::capability::{Capability, CapabilityStatus, TestVerdict};
use foundry_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `CapabilityRepository`.
#[derive(Clone)]
pub struct SqliteCapabilityRepository {
    pool: DatabasePool,
}

impl SqliteCapabilityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct CapabilityRow {
    name: String,
    description: String,
    source_location: String,
    origin: String,
    status: String,
    test_verdict: String,
    test_output: Option<String>,
    created_for: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CapabilityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            source_location: row.try_get("source_location")?,
            origin: row.try_get("origin")?,
            status: row.try_get("status")?,
            test_verdict: row.try_get("test_verdict")?,
            test_output: row.try_get("test_output")?,
            created_for: row.try_get("created_for")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_capability(self) -> Result<Capability, RepositoryError> {
        Ok(Capability {
            name: self.name,
            description: self.description,
            source_location: self.source_location,
            origin: self.origin.parse().map_err(RepositoryError::Query)?,
            status: self.status.parse().map_err(RepositoryError::Query)?,
            test_verdict: self.test_verdict.parse().map_err(RepositoryError::Query)?,
            test_output: self.test_output,
            created_for: self.created_for,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<Capability>, RepositoryError> {
    rows.iter()
        .map(|row| {
            CapabilityRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_capability()
        })
        .collect()
}

impl CapabilityRepository for SqliteCapabilityRepository {
    async fn upsert(&self, capability: &Capability) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO capabilities (name, description, source_location, origin, status, test_verdict, test_output, created_for, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                source_location = excluded.source_location,
                origin = excluded.origin,
                status = excluded.status,
                test_verdict = excluded.test_verdict,
                test_output = excluded.test_output,
                created_for = COALESCE(excluded.created_for, capabilities.created_for),
                updated_at = excluded.updated_at",
        )
        .bind(&capability.name)
        .bind(&capability.description)
        .bind(&capability.source_location)
        .bind(capability.origin.to_string())
        .bind(capability.status.to_string())
        .bind(capability.test_verdict.to_string())
        .bind(&capability.test_output)
        .bind(&capability.created_for)
        .bind(format_datetime(&capability.created_at))
        .bind(format_datetime(&capability.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Capability>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM capabilities WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.map(|row| {
            CapabilityRow::from_row(&row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_capability()
        })
        .transpose()
    }

    async fn list_active(&self) -> Result<Vec<Capability>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM capabilities WHERE status = 'active' ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_rows(rows)
    }

    async fn list_all(&self) -> Result<Vec<Capability>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM capabilities ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        map_rows(rows)
    }

    async fn set_verdict(
        &self,
        name: &str,
        verdict: TestVerdict,
        output: &str,
        status: CapabilityStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE capabilities SET test_verdict = ?, test_output = ?, status = ?, updated_at = ? WHERE name = ?",
        )
        .bind(verdict.to_string())
        .bind(output)
        .bind(status.to_string())
        .bind(format_datetime(&chrono::Utc::now()))
        .bind(name)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_owner(&self, name: &str, worker_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE capabilities SET created_for = ?, updated_at = ? WHERE name = ?")
            .bind(worker_id)
            .bind(format_datetime(&chrono::Utc::now()))
            .bind(name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
