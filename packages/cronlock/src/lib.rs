//! # Cronlock
//!
//! A multi-tenant distributed cron scheduler for horizontally scaled
//! services sharing a Postgres store. Every instance runs the same job
//! registry; at most one of them executes a given `(tenant, job)`
//! occurrence, every attempt leaves an audit row, and state abandoned by
//! crashed instances is reclaimed automatically.
//!
//! ## Architecture
//!
//! ```text
//! JobManager (per process, instance_id)
//!     │
//!     ├─► tick loop (tokio-cron-scheduler, one entry per job)
//!     │       │
//!     │       ▼ per tick
//!     │   Executor pipeline
//!     │       ├─► audit: started
//!     │       ├─► enabled gate ──────────► skipped("disabled")
//!     │       ├─► advisory lock ─────────► skipped("already running in another instance")
//!     │       ├─► row lock (job_locks) ──► skipped("already locked in database")
//!     │       ├─► heartbeat (long-running jobs)
//!     │       ├─► job body (panic guard)
//!     │       └─► lock + audit: completed | failed
//!     │
//!     └─► Reaper (ticker): stale locks, stale registrations,
//!         orphaned audit rows, retention
//! ```
//!
//! Mutual exclusion is layered: the Postgres advisory lock is the fast
//! path, the `job_locks` row with its conditional upsert is authoritative.
//! Long-running jobs keep their row alive with heartbeats; rows whose
//! heartbeat goes stale are presumed abandoned and reaped, which is what
//! lets the fleet recover from crashes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cronlock::{Job, JobManager, SchedulerConfig, Store};
//!
//! let store = Store::connect(&database_url).await?;
//! let manager = JobManager::new(store.clone(), SchedulerConfig::from_env());
//! manager.register(Arc::new(DailyReport)).await?;
//! manager.start().await?;
//!
//! // optionally expose the HTTP surface
//! let app = cronlock::server::router(cronlock::server::AppState::new(store));
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod job;
pub mod kernel;
pub mod schedule;
pub mod server;
pub mod service;
pub mod store;

pub use config::SchedulerConfig;
pub use error::Error;
pub use job::Job;
pub use kernel::JobManager;
pub use store::Store;
