use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::common::pagination::{PageQuery, PagingRequest};
use crate::server::app::AppState;
use crate::server::Tenant;
use crate::store::{JobAuditLog, RegisteredJob};

use super::{internal_error, not_found, ErrorBody};

type Rejection = (StatusCode, Json<ErrorBody>);

fn paging_request() -> PagingRequest {
    PagingRequest {
        max_page_size: 50,
        default_page_size: 10,
        default_sort_by: "job_name",
        default_order: "ASC",
        allowed_sort_columns: &[
            "job_name",
            "schedule",
            "last_registered_at",
            "created_at",
            "updated_at",
        ],
    }
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<RegisteredJob>>, Rejection> {
    let paging = paging_request().resolve(&query);
    let jobs = state
        .store
        .list_registered_jobs(&tenant_id, query.q.as_deref(), &paging)
        .await
        .map_err(internal_error)?;
    Ok(Json(jobs))
}

pub async fn fetch(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<RegisteredJob>, Rejection> {
    state
        .store
        .get_registered_job(id, &tenant_id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("registered job not found"))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegisteredJobRequest {
    pub is_enabled: Option<bool>,
}

/// Update a registration. Currently only `is_enabled` is mutable; the
/// scheduler honors the flag at execution time by skipping disabled jobs.
pub async fn update(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRegisteredJobRequest>,
) -> Result<Json<RegisteredJob>, Rejection> {
    if let Some(is_enabled) = request.is_enabled {
        return state
            .store
            .update_registered_job_enabled(id, &tenant_id, is_enabled)
            .await
            .map_err(internal_error)?
            .map(Json)
            .ok_or_else(|| not_found("registered job not found"));
    }

    state
        .store
        .get_registered_job(id, &tenant_id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("registered job not found"))
}

pub async fn audit_logs(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<JobAuditLog>>, Rejection> {
    let job = state
        .store
        .get_registered_job(id, &tenant_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| not_found("registered job not found"))?;

    let paging = PagingRequest {
        max_page_size: 50,
        default_page_size: 10,
        default_sort_by: "start_time",
        default_order: "DESC",
        allowed_sort_columns: &["scheduled_time", "start_time", "end_time", "created_at"],
    }
    .resolve(&query);

    let logs = state
        .store
        .list_audit_logs_for_job(&tenant_id, &job.job_name, &paging)
        .await
        .map_err(internal_error)?;
    Ok(Json(logs))
}
