use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;

use super::routes::ErrorBody;

pub(crate) const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant partition key, taken from the `x-tenant-id` header set by the
/// host's auth layer. Requests without it are rejected.
pub struct Tenant(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| Tenant(value.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody {
                        error: format!("missing {TENANT_HEADER} header"),
                    }),
                )
            })
    }
}
