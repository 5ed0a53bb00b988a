//! Declarative records of which jobs exist per tenant.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::pagination::Paging;

use super::Store;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RegisteredJob {
    pub id: Uuid,
    pub job_name: String,
    pub schedule: String,
    pub is_long_running: bool,
    pub is_enabled: bool,
    pub last_registered_at: DateTime<Utc>,
    pub instance_id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for [`Store::upsert_registered_job`].
#[derive(Debug, Clone)]
pub struct UpsertRegisteredJob<'a> {
    pub job_name: &'a str,
    pub schedule: &'a str,
    pub is_long_running: bool,
    /// Initial enabled state. Only applies to a fresh row; re-registering
    /// never overrides an admin's toggle.
    pub is_enabled: bool,
    pub instance_id: &'a str,
    pub tenant_id: &'a str,
}

impl Store {
    /// Insert or refresh a registration. Re-registering stamps
    /// `last_registered_at` (the registration heartbeat) and updates the
    /// schedule, but preserves an existing row's `is_enabled` flag.
    pub async fn upsert_registered_job(
        &self,
        params: UpsertRegisteredJob<'_>,
    ) -> Result<RegisteredJob, sqlx::Error> {
        sqlx::query_as::<_, RegisteredJob>(
            r#"
            INSERT INTO registered_jobs
                (job_name, schedule, is_long_running, is_enabled, last_registered_at, instance_id, tenant_id)
            VALUES ($1, $2, $3, $4, now(), $5, $6)
            ON CONFLICT (tenant_id, job_name) DO UPDATE
            SET schedule = EXCLUDED.schedule,
                is_long_running = EXCLUDED.is_long_running,
                last_registered_at = now(),
                instance_id = EXCLUDED.instance_id,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(params.job_name)
        .bind(params.schedule)
        .bind(params.is_long_running)
        .bind(params.is_enabled)
        .bind(params.instance_id)
        .bind(params.tenant_id)
        .fetch_one(self.pool())
        .await
    }

    pub async fn get_registered_job(
        &self,
        id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<RegisteredJob>, sqlx::Error> {
        sqlx::query_as::<_, RegisteredJob>(
            "SELECT * FROM registered_jobs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
    }

    /// Lookup by name, used by the executor's enabled-check.
    pub async fn find_registered_job(
        &self,
        tenant_id: &str,
        job_name: &str,
    ) -> Result<Option<RegisteredJob>, sqlx::Error> {
        sqlx::query_as::<_, RegisteredJob>(
            "SELECT * FROM registered_jobs WHERE tenant_id = $1 AND job_name = $2",
        )
        .bind(tenant_id)
        .bind(job_name)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn list_registered_jobs(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        paging: &Paging,
    ) -> Result<Vec<RegisteredJob>, sqlx::Error> {
        // sort_by/order come from a whitelist, never from user input directly
        let sql = format!(
            r#"
            SELECT * FROM registered_jobs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR job_name ILIKE $2)
            ORDER BY {} {}
            LIMIT $3 OFFSET $4
            "#,
            paging.sort_by, paging.order
        );

        sqlx::query_as::<_, RegisteredJob>(&sql)
            .bind(tenant_id)
            .bind(search.map(|q| format!("%{q}%")))
            .bind(paging.limit)
            .bind(paging.offset)
            .fetch_all(self.pool())
            .await
    }

    pub async fn update_registered_job_enabled(
        &self,
        id: Uuid,
        tenant_id: &str,
        is_enabled: bool,
    ) -> Result<Option<RegisteredJob>, sqlx::Error> {
        sqlx::query_as::<_, RegisteredJob>(
            r#"
            UPDATE registered_jobs
            SET is_enabled = $3, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(is_enabled)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn delete_registered_job(
        &self,
        tenant_id: &str,
        job_name: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM registered_jobs WHERE tenant_id = $1 AND job_name = $2",
        )
        .bind(tenant_id)
        .bind(job_name)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove registrations whose heartbeat predates `cutoff`.
    pub async fn delete_stale_registered_jobs(
        &self,
        tenant_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM registered_jobs WHERE tenant_id = $1 AND last_registered_at < $2",
        )
        .bind(tenant_id)
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
