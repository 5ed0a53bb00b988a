//! Thin HTTP surface over the store: audit-log and registered-job reads,
//! the `is_enabled` toggle, and admin endpoints for migrations and seeding.
//!
//! Authentication and tenant resolution are the host's concern; an upstream
//! layer is expected to set the `x-tenant-id` header.

pub mod app;
pub mod routes;
mod tenant;

pub use app::{router, AppState};
pub use tenant::Tenant;
