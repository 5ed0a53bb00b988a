use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::common::pagination::{PageQuery, PagingRequest};
use crate::server::app::AppState;
use crate::server::Tenant;
use crate::store::JobAuditLog;

use super::{internal_error, not_found, ErrorBody};

type Rejection = (StatusCode, Json<ErrorBody>);

fn paging_request() -> PagingRequest {
    PagingRequest {
        max_page_size: 50,
        default_page_size: 10,
        default_sort_by: "scheduled_time",
        default_order: "DESC",
        allowed_sort_columns: &[
            "job_name",
            "scheduled_time",
            "start_time",
            "end_time",
            "created_at",
        ],
    }
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<JobAuditLog>>, Rejection> {
    let paging = paging_request().resolve(&query);
    let logs = state
        .store
        .list_audit_logs(&tenant_id, query.q.as_deref(), &paging)
        .await
        .map_err(internal_error)?;
    Ok(Json(logs))
}

pub async fn fetch(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<Uuid>,
) -> Result<Json<JobAuditLog>, Rejection> {
    state
        .store
        .get_audit_log(id, &tenant_id)
        .await
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("audit log not found"))
}

pub async fn remove(
    Extension(state): Extension<AppState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    state
        .store
        .delete_audit_log(id, &tenant_id)
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}
