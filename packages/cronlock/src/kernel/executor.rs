//! The per-tick execution pipeline.
//!
//! Each tick flows: audit `started` → enabled gate → advisory lock → row
//! lock → optional heartbeat → job body under a panic guard → terminal lock
//! and audit writes → opportunistic tenant sweep. The advisory and row locks
//! must both be won for the body to run; the two "already" outcomes are
//! recorded with distinct error strings so the audit log tells them apart.
//!
//! Nothing in here propagates an error to the tick loop. Store failures on
//! the critical path turn the attempt into `failed`; failures recording the
//! outcome itself are logged and swallowed.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::job::Job;
use crate::store::{
    advisory_lock_id, AcquireJobLock, AuditStatus, BeginAudit, LockStatus, Store,
};

use super::age_cutoff;
use super::heartbeat;
use super::reaper::Reaper;

const AUDIT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const STATUS_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Execution dependencies shared by every tick callback.
pub(crate) struct Executor {
    pub(crate) store: Store,
    pub(crate) config: SchedulerConfig,
    pub(crate) instance_id: String,
}

impl Executor {
    /// Run one tick of `job`. `ctx` is the manager's long-lived token: it is
    /// handed to the job body and fires on `stop()`, independently of the
    /// lock-acquisition deadline.
    pub(crate) async fn execute(&self, job: &Arc<dyn Job>, ctx: CancellationToken, reaper: &Reaper) {
        let job_name = job.name().to_string();
        let tenant_id = job.tenant_id().to_string();
        let lock_key = job.lock().to_string();
        let request_id = Uuid::new_v4();
        let now = Utc::now();

        let audit_id = match timeout(
            AUDIT_WRITE_TIMEOUT,
            self.store.begin_audit(BeginAudit {
                request_id,
                app_id: &self.instance_id,
                job_name: &job_name,
                tenant_id: &tenant_id,
                scheduled_time: now,
                start_time: now,
            }),
        )
        .await
        {
            Ok(Ok(id)) => Some(id),
            Ok(Err(error)) => {
                warn!(job = %job_name, tenant = %tenant_id, %error, "failed to create audit entry, continuing");
                None
            }
            Err(_) => {
                warn!(job = %job_name, tenant = %tenant_id, "audit entry write timed out, continuing");
                None
            }
        };

        // Admin-disabled jobs skip before any lock is taken. A missing row or
        // an unreadable flag counts as enabled: the in-memory registry is
        // what drives ticks.
        match timeout(
            AUDIT_WRITE_TIMEOUT,
            self.store.find_registered_job(&tenant_id, &job_name),
        )
        .await
        {
            Ok(Ok(Some(registered))) if !registered.is_enabled => {
                info!(job = %job_name, tenant = %tenant_id, "job is disabled, skipping");
                self.finalize(audit_id, &tenant_id, AuditStatus::Skipped, None, Some("disabled"))
                    .await;
                return;
            }
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                warn!(job = %job_name, tenant = %tenant_id, %error, "could not read enabled flag, assuming enabled");
            }
            Err(_) => {
                warn!(job = %job_name, tenant = %tenant_id, "enabled flag read timed out, assuming enabled");
            }
        }

        let lock_id = advisory_lock_id(&tenant_id, &lock_key);
        let advisory = match timeout(
            self.config.lock_acquire_timeout,
            self.store.try_advisory_lock(lock_id),
        )
        .await
        {
            Ok(Ok(Some(guard))) => guard,
            Ok(Ok(None)) => {
                info!(job = %job_name, tenant = %tenant_id, "job already running in another instance");
                self.finalize(
                    audit_id,
                    &tenant_id,
                    AuditStatus::Skipped,
                    None,
                    Some("already running in another instance"),
                )
                .await;
                return;
            }
            Ok(Err(error)) => {
                error!(job = %job_name, tenant = %tenant_id, %error, "failed to acquire advisory lock");
                self.finalize(
                    audit_id,
                    &tenant_id,
                    AuditStatus::Failed,
                    None,
                    Some(&error.to_string()),
                )
                .await;
                return;
            }
            Err(_) => {
                error!(job = %job_name, tenant = %tenant_id, "advisory lock acquisition timed out");
                self.finalize(
                    audit_id,
                    &tenant_id,
                    AuditStatus::Failed,
                    None,
                    Some("advisory lock acquisition timed out"),
                )
                .await;
                return;
            }
        };

        // From here every exit path releases the advisory lock.
        self.run_locked(job, &job_name, &tenant_id, &lock_key, audit_id, ctx)
            .await;
        advisory.release().await;

        reaper
            .sweep_tenant_if_due(&tenant_id, job_name == "system.cleanup")
            .await;
    }

    /// The advisory-locked half of the pipeline: row lock, heartbeat, body,
    /// terminal writes.
    async fn run_locked(
        &self,
        job: &Arc<dyn Job>,
        job_name: &str,
        tenant_id: &str,
        lock_key: &str,
        audit_id: Option<Uuid>,
        ctx: CancellationToken,
    ) {
        let now = Utc::now();
        let lock_row_id = match timeout(
            self.config.lock_acquire_timeout,
            self.store.acquire_job_lock(AcquireJobLock {
                tenant_id,
                lock_key,
                job_name,
                now,
                next_run_time: job.next_run_time(),
                instance_id: &self.instance_id,
                stale_heartbeat_before: age_cutoff(now, self.config.stale_lock_threshold),
            }),
        )
        .await
        {
            Ok(Ok(id)) => id,
            Ok(Err(Error::AlreadyHeld)) => {
                info!(job = %job_name, tenant = %tenant_id, "job already locked in database");
                self.finalize(
                    audit_id,
                    tenant_id,
                    AuditStatus::Skipped,
                    None,
                    Some("already locked in database"),
                )
                .await;
                return;
            }
            Ok(Err(error)) => {
                error!(job = %job_name, tenant = %tenant_id, %error, "failed to acquire job lock");
                self.finalize(
                    audit_id,
                    tenant_id,
                    AuditStatus::Failed,
                    None,
                    Some(&error.to_string()),
                )
                .await;
                return;
            }
            Err(_) => {
                error!(job = %job_name, tenant = %tenant_id, "job lock acquisition timed out");
                self.finalize(
                    audit_id,
                    tenant_id,
                    AuditStatus::Failed,
                    None,
                    Some("job lock acquisition timed out"),
                )
                .await;
                return;
            }
        };

        let heartbeat = job.is_long_running().then(|| {
            info!(job = %job_name, tenant = %tenant_id, "starting heartbeat for long-running job");
            heartbeat::spawn(
                self.store.clone(),
                lock_row_id,
                self.instance_id.clone(),
                self.config.heartbeat_interval,
                &ctx,
            )
        });

        let outcome = AssertUnwindSafe(job.run(ctx.clone())).catch_unwind().await;

        if let Some(heartbeat) = heartbeat {
            heartbeat.stop().await;
        }

        match outcome {
            Ok(Ok(())) => {
                info!(job = %job_name, tenant = %tenant_id, "job executed successfully");
                self.finish_lock(lock_row_id, LockStatus::Completed).await;
                self.finalize(
                    audit_id,
                    tenant_id,
                    AuditStatus::Completed,
                    Some("Job completed successfully"),
                    None,
                )
                .await;
            }
            Ok(Err(error)) => {
                warn!(job = %job_name, tenant = %tenant_id, %error, "job failed");
                self.finish_lock(lock_row_id, LockStatus::Failed).await;
                self.finalize(
                    audit_id,
                    tenant_id,
                    AuditStatus::Failed,
                    None,
                    Some(&format!("{error:#}")),
                )
                .await;
            }
            Err(panic) => {
                let message = format!("Panic: {}", panic_message(panic.as_ref()));
                error!(job = %job_name, tenant = %tenant_id, panic = %message, "job panicked");
                self.finish_lock(lock_row_id, LockStatus::Failed).await;
                self.finalize(audit_id, tenant_id, AuditStatus::Failed, None, Some(&message))
                    .await;
            }
        }
    }

    async fn finish_lock(&self, lock_row_id: Uuid, status: LockStatus) {
        match timeout(
            STATUS_WRITE_TIMEOUT,
            self.store.finish_job_lock(lock_row_id, status),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%lock_row_id, %error, "failed to update job lock status"),
            Err(_) => warn!(%lock_row_id, "job lock status update timed out"),
        }
    }

    /// Terminal audit write. Never fails the execution: a `None` id (the
    /// begin itself failed) is silently accepted, store errors are logged.
    async fn finalize(
        &self,
        audit_id: Option<Uuid>,
        tenant_id: &str,
        status: AuditStatus,
        output: Option<&str>,
        error: Option<&str>,
    ) {
        let Some(audit_id) = audit_id else { return };
        match timeout(
            AUDIT_WRITE_TIMEOUT,
            self.store
                .finalize_audit(audit_id, tenant_id, status, output, error),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => warn!(%audit_id, %error, "failed to finalize audit entry"),
            Err(_) => warn!(%audit_id, "audit finalize timed out"),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_str_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
