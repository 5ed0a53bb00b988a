//! Heartbeat driver for long-running jobs.
//!
//! While a long-running job body executes, a companion task stamps
//! `heartbeat_at` on its lock row so the reaper keeps treating the execution
//! as live. The task stops when the executor closes it after the body
//! returns, or when the manager's shutdown token fires.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::Store;

pub(crate) struct HeartbeatHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) fn spawn(
    store: Store,
    lock_row_id: Uuid,
    instance_id: String,
    interval: Duration,
    parent: &CancellationToken,
) -> HeartbeatHandle {
    let token = parent.child_token();
    let task_token = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // the first tick fires immediately, skip it

        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = ticker.tick() => {
                    match store.heartbeat_job_lock(lock_row_id, &instance_id).await {
                        Ok(0) => {
                            // Row reclaimed or deleted under us; nothing left
                            // to keep alive.
                            debug!(%lock_row_id, "lock row gone, stopping heartbeat");
                            break;
                        }
                        Ok(_) => debug!(%lock_row_id, "job heartbeat"),
                        Err(error) => {
                            warn!(%lock_row_id, %error, "failed to update job heartbeat");
                        }
                    }
                }
            }
        }
    });

    HeartbeatHandle { token, task }
}

impl HeartbeatHandle {
    /// Signal the task and wait for it to wind down.
    pub(crate) async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
