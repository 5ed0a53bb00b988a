//! Periodic reclamation of state abandoned by crashed instances.
//!
//! The reaper ticks on `reaper_interval` (first sweep at scheduler start)
//! and sweeps every tenant this node serves. Tenants are discovered from the
//! live in-memory registry, not the database: a node only reaps tenants it
//! has jobs for. The executor can additionally request an inline sweep after
//! a run; those are rate-limited per tenant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::store::Store;

use super::age_cutoff;

const SWEEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Reference-counted set of tenants with locally registered jobs.
#[derive(Clone, Default)]
pub(crate) struct TenantRegistry {
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl TenantRegistry {
    pub(crate) fn add(&self, tenant_id: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(tenant_id.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn remove(&self, tenant_id: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(tenant_id) {
            *count -= 1;
            if *count == 0 {
                counts.remove(tenant_id);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

#[derive(Clone)]
pub(crate) struct Reaper {
    store: Store,
    config: SchedulerConfig,
    tenants: TenantRegistry,
    last_swept: Arc<Mutex<HashMap<String, Instant>>>,
}

impl Reaper {
    pub(crate) fn new(store: Store, config: SchedulerConfig, tenants: TenantRegistry) -> Self {
        Self {
            store,
            config,
            tenants,
            last_swept: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let reaper = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reaper.config.reaper_interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    // the first tick fires immediately: one sweep at start
                    _ = ticker.tick() => reaper.sweep_all().await,
                }
            }
            debug!("reaper stopped");
        })
    }

    async fn sweep_all(&self) {
        for tenant_id in self.tenants.snapshot() {
            self.sweep_tenant(&tenant_id).await;
        }
    }

    /// Inline sweep requested by the executor after a run. Rate-limited per
    /// tenant; `force` (the dedicated cleanup job) bypasses the limit.
    pub(crate) async fn sweep_tenant_if_due(&self, tenant_id: &str, force: bool) {
        let due = force || {
            let swept = self.last_swept.lock().unwrap_or_else(|e| e.into_inner());
            swept
                .get(tenant_id)
                .map_or(true, |at| at.elapsed() >= self.config.inline_sweep_interval)
        };
        if due {
            self.sweep_tenant(tenant_id).await;
        }
    }

    pub(crate) async fn sweep_tenant(&self, tenant_id: &str) {
        if tokio::time::timeout(SWEEP_TIMEOUT, self.sweep_tenant_inner(tenant_id))
            .await
            .is_err()
        {
            warn!(tenant_id, "reaper sweep timed out");
        }
        self.last_swept
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tenant_id.to_string(), Instant::now());
    }

    async fn sweep_tenant_inner(&self, tenant_id: &str) {
        let now = Utc::now();

        // Stale locks go first so the orphan pass below sees the lock table
        // as a crashed instance left it.
        match self
            .store
            .delete_stale_job_locks(tenant_id, age_cutoff(now, self.config.stale_lock_threshold))
            .await
        {
            Ok(0) => {}
            Ok(count) => info!(tenant_id, count, "reaped stale job locks"),
            Err(error) => warn!(tenant_id, %error, "failed to reap stale job locks"),
        }

        match self
            .store
            .fail_orphaned_audit_logs(
                tenant_id,
                age_cutoff(now, self.config.orphaned_audit_threshold),
            )
            .await
        {
            Ok(0) => {}
            Ok(count) => info!(tenant_id, count, "failed orphaned audit entries"),
            Err(error) => warn!(tenant_id, %error, "failed to reconcile orphaned audit entries"),
        }

        match self
            .store
            .delete_stale_registered_jobs(
                tenant_id,
                age_cutoff(now, self.config.stale_registration_threshold),
            )
            .await
        {
            Ok(0) => {}
            Ok(count) => info!(tenant_id, count, "reaped stale job registrations"),
            Err(error) => warn!(tenant_id, %error, "failed to reap stale job registrations"),
        }

        match self
            .store
            .delete_old_audit_logs(tenant_id, age_cutoff(now, self.config.audit_retention))
            .await
        {
            Ok(0) => {}
            Ok(count) => info!(tenant_id, count, "purged old audit entries"),
            Err(error) => warn!(tenant_id, %error, "failed to purge old audit entries"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_registry_counts_references() {
        let tenants = TenantRegistry::default();
        tenants.add("t1");
        tenants.add("t1");
        tenants.add("t2");

        let mut snapshot = tenants.snapshot();
        snapshot.sort();
        assert_eq!(snapshot, vec!["t1", "t2"]);

        tenants.remove("t1");
        let mut snapshot = tenants.snapshot();
        snapshot.sort();
        assert_eq!(snapshot, vec!["t1", "t2"]);

        tenants.remove("t1");
        assert_eq!(tenants.snapshot(), vec!["t2"]);
    }

    #[test]
    fn removing_unknown_tenant_is_a_no_op() {
        let tenants = TenantRegistry::default();
        tenants.remove("missing");
        assert!(tenants.snapshot().is_empty());
    }
}
