use std::time::{Duration, Instant};

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Liveness of the scheduler's store. Everything the manager does goes
/// through Postgres, so one measured round trip plus pool occupancy is the
/// whole picture.
#[derive(Serialize)]
pub struct HealthReport {
    healthy: bool,
    store: StoreHealth,
}

#[derive(Serialize)]
pub struct StoreHealth {
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    pool_connections: u32,
    pool_idle: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthReport>) {
    let pool = state.store.pool();

    let started = Instant::now();
    let probe = tokio::time::timeout(PROBE_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await;
    let (reachable, detail) = match probe {
        Ok(Ok(_)) => (true, None),
        Ok(Err(error)) => (false, Some(error.to_string())),
        Err(_) => (
            false,
            Some(format!(
                "store probe exceeded {}s",
                PROBE_TIMEOUT.as_secs()
            )),
        ),
    };

    let report = HealthReport {
        healthy: reachable,
        store: StoreHealth {
            reachable,
            latency_ms: reachable.then(|| started.elapsed().as_millis() as u64),
            pool_connections: pool.size(),
            pool_idle: pool.num_idle(),
            detail,
        },
    };

    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
