//! Append-only audit trail of execution attempts.
//!
//! State machine: `started → completed | failed | skipped`. Terminal states
//! are absorbing; `finalize_audit` only touches rows still in `started`, so
//! repeated finalization is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::common::pagination::Paging;

use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_audit_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobAuditLog {
    pub id: Uuid,
    pub request_id: Uuid,
    pub app_id: String,
    pub job_name: String,
    pub scheduled_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AuditStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parameters for [`Store::begin_audit`].
#[derive(Debug, Clone)]
pub struct BeginAudit<'a> {
    pub request_id: Uuid,
    pub app_id: &'a str,
    pub job_name: &'a str,
    pub tenant_id: &'a str,
    pub scheduled_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
}

impl Store {
    /// Record the start of an attempt. One row per attempt, including
    /// attempts that end up skipped.
    pub async fn begin_audit(&self, params: BeginAudit<'_>) -> Result<Uuid, sqlx::Error> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO job_audit_logs
                (request_id, app_id, job_name, scheduled_time, start_time, status, tenant_id)
            VALUES ($1, $2, $3, $4, $5, 'started', $6)
            RETURNING id
            "#,
        )
        .bind(params.request_id)
        .bind(params.app_id)
        .bind(params.job_name)
        .bind(params.scheduled_time)
        .bind(params.start_time)
        .bind(params.tenant_id)
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    /// Write the terminal state. Rows already terminal are left untouched;
    /// returns the number of rows updated (0 or 1).
    pub async fn finalize_audit(
        &self,
        id: Uuid,
        tenant_id: &str,
        status: AuditStatus,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE job_audit_logs
            SET status = $3, output = $4, error = $5, end_time = now(), updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND status = 'started'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(status)
        .bind(output)
        .bind(error)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_audit_log(
        &self,
        id: Uuid,
        tenant_id: &str,
    ) -> Result<Option<JobAuditLog>, sqlx::Error> {
        sqlx::query_as::<_, JobAuditLog>(
            "SELECT * FROM job_audit_logs WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
    }

    pub async fn list_audit_logs(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        paging: &Paging,
    ) -> Result<Vec<JobAuditLog>, sqlx::Error> {
        // sort_by/order come from a whitelist, never from user input directly
        let sql = format!(
            r#"
            SELECT * FROM job_audit_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR job_name ILIKE $2)
            ORDER BY {} {}
            LIMIT $3 OFFSET $4
            "#,
            paging.sort_by, paging.order
        );

        sqlx::query_as::<_, JobAuditLog>(&sql)
            .bind(tenant_id)
            .bind(search.map(|q| format!("%{q}%")))
            .bind(paging.limit)
            .bind(paging.offset)
            .fetch_all(self.pool())
            .await
    }

    pub async fn list_audit_logs_for_job(
        &self,
        tenant_id: &str,
        job_name: &str,
        paging: &Paging,
    ) -> Result<Vec<JobAuditLog>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT * FROM job_audit_logs
            WHERE tenant_id = $1 AND job_name = $2
            ORDER BY {} {}
            LIMIT $3 OFFSET $4
            "#,
            paging.sort_by, paging.order
        );

        sqlx::query_as::<_, JobAuditLog>(&sql)
            .bind(tenant_id)
            .bind(job_name)
            .bind(paging.limit)
            .bind(paging.offset)
            .fetch_all(self.pool())
            .await
    }

    pub async fn delete_audit_log(&self, id: Uuid, tenant_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM job_audit_logs WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Retention sweep: drop terminal rows created before `cutoff`.
    pub async fn delete_old_audit_logs(
        &self,
        tenant_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_audit_logs
            WHERE tenant_id = $1 AND status <> 'started' AND created_at < $2
            "#,
        )
        .bind(tenant_id)
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Reconcile rows left in `started` by a crashed instance: anything
    /// older than `cutoff` with no `running` lock for the same job becomes
    /// `failed(error="orphaned")`.
    pub async fn fail_orphaned_audit_logs(
        &self,
        tenant_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE job_audit_logs a
            SET status = 'failed', error = 'orphaned', end_time = now(), updated_at = now()
            WHERE a.tenant_id = $1
              AND a.status = 'started'
              AND a.start_time < $2
              AND NOT EXISTS (
                  SELECT 1 FROM job_locks l
                  WHERE l.tenant_id = a.tenant_id
                    AND l.job_name = a.job_name
                    AND l.status = 'running'
              )
            "#,
        )
        .bind(tenant_id)
        .bind(cutoff)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }
}
