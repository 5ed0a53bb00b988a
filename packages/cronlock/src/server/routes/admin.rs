//! Administrative endpoints: schema migrations and tenant seeding.
//!
//! Role checks (admin / super-admin) are enforced by the host's auth layer
//! in front of this router.

use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::server::app::AppState;
use crate::server::Tenant;

use super::{internal_error, ErrorBody};

type Rejection = (StatusCode, Json<ErrorBody>);

pub async fn migrate_up(Extension(state): Extension<AppState>) -> Result<StatusCode, Rejection> {
    state.store.migrate().await.map_err(internal_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn migrate_down(Extension(state): Extension<AppState>) -> Result<StatusCode, Rejection> {
    state.store.migrate_down().await.map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seed_reference_data(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
) -> Result<StatusCode, Rejection> {
    state
        .seed
        .seed_reference_data(&tenant_id)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn seed_sample_data(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
) -> Result<StatusCode, Rejection> {
    state
        .seed
        .seed_sample_data(&tenant_id)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::CREATED)
}
