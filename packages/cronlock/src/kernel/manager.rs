//! The job manager: registry, tick loop, lifecycle.
//!
//! One manager per process. Hosts construct it explicitly, register jobs,
//! and call [`start`](JobManager::start); registration is also allowed while
//! running. At most one instance in the fleet executes a given
//! `(tenant, job)` occurrence — the per-tick pipeline in
//! [`executor`](super::executor) enforces that with an advisory lock plus a
//! row-level lock record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_cron_scheduler::{Job as TickJob, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::Error;
use crate::job::{job_key, Job};
use crate::schedule::Schedule;
use crate::store::{Store, UpsertRegisteredJob};

use super::executor::Executor;
use super::reaper::{Reaper, TenantRegistry};

const REGISTRY_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JobManager {
    executor: Arc<Executor>,
    reaper: Reaper,
    tenants: TenantRegistry,
    config: SchedulerConfig,
    state: Mutex<ManagerState>,
}

/// Mutable registry state, guarded by one mutex held for minimal windows.
struct ManagerState {
    jobs: Vec<Arc<dyn Job>>,
    entry_ids: HashMap<String, Uuid>,
    scheduler: Option<JobScheduler>,
    reaper_task: Option<JoinHandle<()>>,
    run_token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    is_running: bool,
}

impl JobManager {
    /// Create a manager over `store`. Mints the instance id that identifies
    /// this process in every row it writes.
    pub fn new(store: Store, config: SchedulerConfig) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        info!(%instance_id, "job manager created");

        let tenants = TenantRegistry::default();
        let reaper = Reaper::new(store.clone(), config.clone(), tenants.clone());

        Self {
            executor: Arc::new(Executor {
                store,
                config: config.clone(),
                instance_id,
            }),
            reaper,
            tenants,
            config,
            state: Mutex::new(ManagerState {
                jobs: Vec::new(),
                entry_ids: HashMap::new(),
                scheduler: None,
                reaper_task: None,
                run_token: CancellationToken::new(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                is_running: false,
            }),
        }
    }

    /// Unique identifier of this process, stamped on every row it writes.
    pub fn instance_id(&self) -> &str {
        &self.executor.instance_id
    }

    /// Number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    /// Add a job. Validates the schedule up front; a duplicate
    /// `(tenant, name)` is a no-op. The `registered_jobs` upsert is
    /// best-effort — transient store failures never fail registration, the
    /// in-memory registry is what drives the tick loop.
    pub async fn register(&self, job: Arc<dyn Job>) -> Result<(), Error> {
        Schedule::parse(job.schedule())?;

        let key = job_key(job.tenant_id(), job.name());
        let mut state = self.state.lock().await;
        if state
            .jobs
            .iter()
            .any(|existing| job_key(existing.tenant_id(), existing.name()) == key)
        {
            debug!(job = %job.name(), tenant = %job.tenant_id(), "job already registered");
            return Ok(());
        }

        state.jobs.push(Arc::clone(&job));
        self.tenants.add(job.tenant_id());

        let upsert = self.executor.store.upsert_registered_job(UpsertRegisteredJob {
            job_name: job.name(),
            schedule: job.schedule(),
            is_long_running: job.is_long_running(),
            is_enabled: true,
            instance_id: &self.executor.instance_id,
            tenant_id: job.tenant_id(),
        });
        match timeout(REGISTRY_WRITE_TIMEOUT, upsert).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                warn!(job = %job.name(), tenant = %job.tenant_id(), %error, "failed to persist registration");
            }
            Err(_) => {
                warn!(job = %job.name(), tenant = %job.tenant_id(), "registration write timed out");
            }
        }

        if state.is_running {
            self.schedule_job(&mut state, &job).await;
        }

        info!(job = %job.name(), tenant = %job.tenant_id(), "job registered");
        Ok(())
    }

    /// Remove a job: tick entry (if scheduled), in-memory entry, and the
    /// `registered_jobs` row. An in-flight execution completes with its
    /// previously resolved state.
    pub async fn unregister(&self, job_name: &str, tenant_id: &str) {
        let key = job_key(tenant_id, job_name);

        let mut state = self.state.lock().await;
        if let Some(entry_id) = state.entry_ids.remove(&key) {
            if let Some(scheduler) = state.scheduler.as_ref() {
                if let Err(error) = scheduler.remove(&entry_id).await {
                    warn!(job = job_name, tenant = tenant_id, %error, "failed to remove tick entry");
                }
            }
        }
        if let Some(position) = state
            .jobs
            .iter()
            .position(|job| job.name() == job_name && job.tenant_id() == tenant_id)
        {
            state.jobs.remove(position);
            self.tenants.remove(tenant_id);
            info!(job = job_name, tenant = tenant_id, "job unregistered");
        }
        drop(state);

        match timeout(
            REGISTRY_WRITE_TIMEOUT,
            self.executor.store.delete_registered_job(tenant_id, job_name),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                warn!(job = job_name, tenant = tenant_id, %error, "failed to delete registration row");
            }
            Err(_) => warn!(job = job_name, tenant = tenant_id, "registration delete timed out"),
        }
    }

    /// Start the tick loop and the reaper. Errors if already running.
    pub async fn start(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.is_running {
            return Err(Error::AlreadyRunning);
        }

        state.run_token = CancellationToken::new();
        state.in_flight = Arc::new(AtomicUsize::new(0));
        state.entry_ids.clear();
        state.scheduler = Some(JobScheduler::new().await?);

        let jobs = state.jobs.clone();
        for job in &jobs {
            self.schedule_job(&mut state, job).await;
        }

        if let Some(scheduler) = state.scheduler.as_ref() {
            scheduler.start().await?;
        }

        state.reaper_task = Some(self.reaper.spawn(state.run_token.child_token()));
        state.is_running = true;
        info!(jobs = jobs.len(), "scheduler started");
        Ok(())
    }

    /// Graceful stop: no new ticks, cancel the context handed to in-flight
    /// bodies, wait up to `shutdown_timeout` for them, stop the reaper.
    /// The manager can be started again afterwards.
    pub async fn stop(&self) -> Result<(), Error> {
        let (scheduler, reaper_task, run_token, in_flight) = {
            let mut state = self.state.lock().await;
            if !state.is_running {
                return Err(Error::NotRunning);
            }
            state.is_running = false;
            state.entry_ids.clear();
            (
                state.scheduler.take(),
                state.reaper_task.take(),
                state.run_token.clone(),
                Arc::clone(&state.in_flight),
            )
        };

        if let Some(mut scheduler) = scheduler {
            if let Err(error) = scheduler.shutdown().await {
                warn!(%error, "tick scheduler shutdown reported an error");
            }
        }
        run_token.cancel();

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        while in_flight.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let remaining = in_flight.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(
                remaining,
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "shutdown timed out with jobs still in flight"
            );
        }

        if let Some(task) = reaper_task {
            let _ = task.await;
        }

        info!("scheduler stopped");
        Ok(())
    }

    async fn schedule_job(&self, state: &mut ManagerState, job: &Arc<dyn Job>) {
        let Some(scheduler) = state.scheduler.as_ref() else {
            return;
        };

        let key = job_key(job.tenant_id(), job.name());
        let executor = Arc::clone(&self.executor);
        let reaper = self.reaper.clone();
        let run_token = state.run_token.clone();
        let in_flight = Arc::clone(&state.in_flight);
        let job_for_tick = Arc::clone(job);

        let tick_job = match TickJob::new_async(job.schedule(), move |_entry_id, _scheduler| {
            let executor = Arc::clone(&executor);
            let reaper = reaper.clone();
            let job = Arc::clone(&job_for_tick);
            let ctx = run_token.clone();
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                if ctx.is_cancelled() {
                    return;
                }
                in_flight.fetch_add(1, Ordering::SeqCst);
                executor.execute(&job, ctx, &reaper).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        }) {
            Ok(tick_job) => tick_job,
            Err(error) => {
                error!(job = %job.name(), tenant = %job.tenant_id(), %error, "failed to build tick entry");
                return;
            }
        };

        match scheduler.add(tick_job).await {
            Ok(entry_id) => {
                debug!(job = %job.name(), tenant = %job.tenant_id(), %entry_id, "job wired into tick loop");
                state.entry_ids.insert(key, entry_id);
            }
            Err(error) => {
                error!(job = %job.name(), tenant = %job.tenant_id(), %error, "failed to schedule job");
            }
        }
    }
}
