//! The contract scheduled jobs implement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::schedule::Schedule;

/// A recurring job owned by the [`JobManager`](crate::kernel::JobManager).
///
/// Implementations are registered once per `(tenant, name)` and invoked on
/// every matching tick. The `ctx` passed to [`run`](Job::run) is the
/// manager's long-lived cancellation token: it fires on `stop()`, not when
/// lock acquisition times out, so bodies may run longer than the acquisition
/// deadline. Bodies are expected to observe cancellation cooperatively.
#[async_trait]
pub trait Job: Send + Sync {
    /// Display name; unique within a tenant.
    fn name(&self) -> &str;

    /// Lock key. Defaults to the job name; distinct keys let several logical
    /// jobs share one mutual-exclusion scope.
    fn lock(&self) -> &str {
        self.name()
    }

    /// Opaque tenant partition key.
    fn tenant_id(&self) -> &str;

    /// Six-field cron expression (seconds through day-of-week).
    fn schedule(&self) -> &str;

    /// Whether executions typically outlive the stale-lock threshold.
    /// Enables heartbeat updates during execution.
    fn is_long_running(&self) -> bool {
        false
    }

    /// When this job should fire next. The default derives it from
    /// [`schedule`](Job::schedule); registration has already validated the
    /// expression, so a `None` here means the schedule has no future
    /// occurrence.
    fn next_run_time(&self) -> Option<DateTime<Utc>> {
        Schedule::parse(self.schedule())
            .ok()
            .and_then(|s| s.next_after(Utc::now()))
    }

    /// The job body. Errors are recorded in the audit log as `failed`.
    async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()>;
}

/// Registry key for a job: `"{tenant_id}:{name}"`.
pub(crate) fn job_key(tenant_id: &str, name: &str) -> String {
    format!("{tenant_id}:{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedJob;

    #[async_trait]
    impl Job for FixedJob {
        fn name(&self) -> &str {
            "fixed"
        }

        fn tenant_id(&self) -> &str {
            "t1"
        }

        fn schedule(&self) -> &str {
            "0 * * * * *"
        }

        async fn run(&self, _ctx: CancellationToken) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lock_defaults_to_name() {
        assert_eq!(FixedJob.lock(), "fixed");
    }

    #[test]
    fn next_run_time_is_future() {
        let next = FixedJob.next_run_time().unwrap();
        assert!(next > Utc::now() - chrono::Duration::seconds(1));
    }

    #[test]
    fn job_key_is_tenant_scoped() {
        assert_eq!(job_key("t1", "sync"), "t1:sync");
        assert_ne!(job_key("t1", "sync"), job_key("t2", "sync"));
    }
}
