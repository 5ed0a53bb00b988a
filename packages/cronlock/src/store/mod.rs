//! Postgres-backed persistence for the scheduler.
//!
//! The [`Store`] wraps a shared [`PgPool`]. Row modules own their SQL:
//! registered jobs, job locks, and audit logs. Migrations are embedded and
//! applied on [`Store::connect`] unless suppressed.

mod advisory;
mod audit_logs;
mod job_locks;
mod registered_jobs;

pub use advisory::{advisory_lock_id, AdvisoryLock};
pub use audit_logs::{AuditStatus, BeginAudit, JobAuditLog};
pub use job_locks::{AcquireJobLock, JobLock, LockStatus};
pub use registered_jobs::{RegisteredJob, UpsertRegisteredJob};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::Error;

/// Embedded, versioned migrations (reversible pairs).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle to the relational store. Cheap to clone; all clones share the pool.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool without touching the schema. The caller is
    /// responsible for having applied migrations.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Revert all applied migrations.
    pub async fn migrate_down(&self) -> Result<(), Error> {
        MIGRATOR.undo(&self.pool, 0).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
