use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::service::SeedService;
use crate::store::Store;

use super::routes::{admin, audit_logs, health, registered_jobs};

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub seed: SeedService,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        let seed = SeedService::new(store.clone());
        Self { store, seed }
    }
}

/// Build the router. Hosts nest or merge this into their own application.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/registered-jobs", get(registered_jobs::list))
        .route(
            "/registered-jobs/:id",
            get(registered_jobs::fetch).put(registered_jobs::update),
        )
        .route(
            "/registered-jobs/:id/audit-logs",
            get(registered_jobs::audit_logs),
        )
        .route("/audit-logs", get(audit_logs::list))
        .route(
            "/audit-logs/:id",
            get(audit_logs::fetch).delete(audit_logs::remove),
        )
        .route("/admin/migrations/up", post(admin::migrate_up))
        .route("/admin/migrations/down", post(admin::migrate_down))
        .route("/admin/seed/reference-data", post(admin::seed_reference_data))
        .route("/admin/seed/sample-data", post(admin::seed_sample_data))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
