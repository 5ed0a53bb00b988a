use thiserror::Error;

/// Errors surfaced by the scheduler library.
///
/// Job bodies return `anyhow::Error`; those never cross the tick boundary
/// and are recorded in the audit log instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The cron expression could not be parsed. Surfaced from `register`.
    #[error("invalid schedule {expression:?}: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// Another execution holds the row lock for this `(tenant, lock)`.
    /// Internal: the executor turns this into a `skipped` audit entry.
    #[error("job already locked in database")]
    AlreadyHeld,

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler is not running")]
    NotRunning,

    #[error(transparent)]
    Store(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("tick scheduler error: {0}")]
    Tick(#[from] tokio_cron_scheduler::JobSchedulerError),
}
