//! Page-numbered pagination for the list endpoints.
//!
//! Sort columns cannot be bound as SQL parameters, so requested sort fields
//! are validated against a per-endpoint whitelist before they reach an
//! `ORDER BY` clause; anything unrecognized falls back to the default.

use serde::Deserialize;

/// Query-string parameters accepted by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Optional search term (substring match on the endpoint's name column).
    pub q: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Endpoint-specific pagination policy.
#[derive(Debug, Clone)]
pub struct PagingRequest {
    pub max_page_size: u32,
    pub default_page_size: u32,
    pub default_sort_by: &'static str,
    pub default_order: &'static str,
    pub allowed_sort_columns: &'static [&'static str],
}

/// Normalized paging ready to be applied to a query.
#[derive(Debug, Clone)]
pub struct Paging {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: &'static str,
    pub order: &'static str,
}

impl PagingRequest {
    pub fn resolve(&self, query: &PageQuery) -> Paging {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        let sort_by = query
            .sort_by
            .as_deref()
            .and_then(|requested| {
                self.allowed_sort_columns
                    .iter()
                    .find(|col| **col == requested)
                    .copied()
            })
            .unwrap_or(self.default_sort_by);

        let order = match query.order.as_deref() {
            Some("asc") => "ASC",
            Some("desc") => "DESC",
            _ => self.default_order,
        };

        Paging {
            limit: i64::from(page_size),
            offset: i64::from((page - 1) * page_size),
            sort_by,
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PagingRequest {
        PagingRequest {
            max_page_size: 50,
            default_page_size: 10,
            default_sort_by: "job_name",
            default_order: "ASC",
            allowed_sort_columns: &["job_name", "created_at"],
        }
    }

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let paging = request().resolve(&PageQuery::default());
        assert_eq!(paging.limit, 10);
        assert_eq!(paging.offset, 0);
        assert_eq!(paging.sort_by, "job_name");
        assert_eq!(paging.order, "ASC");
    }

    #[test]
    fn page_size_is_capped() {
        let query = PageQuery {
            page_size: Some(500),
            ..Default::default()
        };
        assert_eq!(request().resolve(&query).limit, 50);
    }

    #[test]
    fn offset_follows_page_number() {
        let query = PageQuery {
            page: Some(3),
            page_size: Some(20),
            ..Default::default()
        };
        let paging = request().resolve(&query);
        assert_eq!(paging.limit, 20);
        assert_eq!(paging.offset, 40);
    }

    #[test]
    fn unknown_sort_column_falls_back_to_default() {
        let query = PageQuery {
            sort_by: Some("created_at; DROP TABLE job_locks".to_string()),
            order: Some("desc".to_string()),
            ..Default::default()
        };
        let paging = request().resolve(&query);
        assert_eq!(paging.sort_by, "job_name");
        assert_eq!(paging.order, "DESC");
    }

    #[test]
    fn page_zero_is_treated_as_first_page() {
        let query = PageQuery {
            page: Some(0),
            ..Default::default()
        };
        assert_eq!(request().resolve(&query).offset, 0);
    }
}
