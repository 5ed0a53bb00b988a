//! Tenant seeding.

use anyhow::Result;
use tracing::info;

use crate::store::{Store, UpsertRegisteredJob};

/// Provisions a tenant's baseline scheduler rows. Idempotent: seeding twice
/// re-stamps the same registrations.
#[derive(Clone)]
pub struct SeedService {
    store: Store,
}

const SEED_INSTANCE_ID: &str = "seed";

impl SeedService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Reference data every tenant needs: the dedicated cleanup job, which
    /// forces a reaper sweep whenever it runs.
    pub async fn seed_reference_data(&self, tenant_id: &str) -> Result<()> {
        self.store
            .upsert_registered_job(UpsertRegisteredJob {
                job_name: "system.cleanup",
                schedule: "0 0 4 * * *",
                is_long_running: false,
                is_enabled: true,
                instance_id: SEED_INSTANCE_ID,
                tenant_id,
            })
            .await?;
        info!(tenant_id, "seeded reference data");
        Ok(())
    }

    /// Demo rows for exploratory environments. The sample job is seeded
    /// disabled so it also exercises the admin enable toggle.
    pub async fn seed_sample_data(&self, tenant_id: &str) -> Result<()> {
        self.store
            .upsert_registered_job(UpsertRegisteredJob {
                job_name: "sample.daily-report",
                schedule: "0 0 3 * * *",
                is_long_running: false,
                is_enabled: false,
                instance_id: SEED_INSTANCE_ID,
                tenant_id,
            })
            .await?;
        info!(tenant_id, "seeded sample data");
        Ok(())
    }
}
