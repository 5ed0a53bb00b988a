//! Row-level job locks: the authoritative active-execution sentinel.
//!
//! One row per `(tenant, lock_key)`. An execution takes the row over via a
//! conditional upsert; a rejected predicate means another instance is
//! running and the attempt is skipped. The reaper deletes rows whose
//! heartbeat went stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::Error;

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_lock_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobLock {
    pub id: Uuid,
    pub job_name: String,
    pub lock_key: String,
    pub tenant_id: String,
    pub status: LockStatus,
    pub acquired_at: DateTime<Utc>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub instance_id: String,
    pub heartbeat_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for [`Store::acquire_job_lock`].
#[derive(Debug, Clone)]
pub struct AcquireJobLock<'a> {
    pub tenant_id: &'a str,
    pub lock_key: &'a str,
    pub job_name: &'a str,
    pub now: DateTime<Utc>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub instance_id: &'a str,
    /// Heartbeats older than this are treated as abandoned, so the row may
    /// be taken over even though it still says `running`.
    pub stale_heartbeat_before: DateTime<Utc>,
}

impl Store {
    /// Insert the lock row, or take over an existing one that is terminal or
    /// has a stale heartbeat. Returns [`Error::AlreadyHeld`] when the
    /// predicate rejects the write (a live `running` row exists).
    pub async fn acquire_job_lock(&self, params: AcquireJobLock<'_>) -> Result<Uuid, Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO job_locks
                (job_name, lock_key, tenant_id, status, acquired_at, next_run_time, instance_id, heartbeat_at)
            VALUES ($1, $2, $3, 'running', $4, $5, $6, $4)
            ON CONFLICT (tenant_id, lock_key) DO UPDATE
            SET job_name = EXCLUDED.job_name,
                status = 'running',
                acquired_at = EXCLUDED.acquired_at,
                next_run_time = EXCLUDED.next_run_time,
                instance_id = EXCLUDED.instance_id,
                heartbeat_at = EXCLUDED.heartbeat_at,
                updated_at = now()
            WHERE job_locks.status <> 'running' OR job_locks.heartbeat_at < $7
            RETURNING id
            "#,
        )
        .bind(params.job_name)
        .bind(params.lock_key)
        .bind(params.tenant_id)
        .bind(params.now)
        .bind(params.next_run_time)
        .bind(params.instance_id)
        .bind(params.stale_heartbeat_before)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some((id,)) => Ok(id),
            None => Err(Error::AlreadyHeld),
        }
    }

    /// Transition a lock row to a terminal status.
    pub async fn finish_job_lock(&self, id: Uuid, status: LockStatus) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE job_locks SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Stamp the heartbeat. Guarded by instance and status so a reclaimed
    /// row is never refreshed by its previous owner.
    pub async fn heartbeat_job_lock(
        &self,
        id: Uuid,
        instance_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE job_locks
            SET heartbeat_at = now(), updated_at = now()
            WHERE id = $1 AND instance_id = $2 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(instance_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_job_lock(
        &self,
        id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<JobLock>, sqlx::Error> {
        sqlx::query_as::<_, JobLock>("SELECT * FROM job_locks WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool())
            .await
    }

    /// Delete `running` rows abandoned by crashed instances.
    pub async fn delete_stale_job_locks(
        &self,
        tenant_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_locks
            WHERE tenant_id = $1 AND status = 'running' AND heartbeat_at < $2
            "#,
        )
        .bind(tenant_id)
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
