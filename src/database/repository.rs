use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::database::values::ColumnValues;
use crate::error::ApiError;
use crate::resources::Resource;

/// Persistence failure. Unique violations get their own variant so
/// controllers can surface them as conflicts instead of generic 500s.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("unique constraint violated")]
    UniqueViolation { constraint: Option<String> },
    #[error(transparent)]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return PersistError::UniqueViolation {
                    constraint: db.constraint().map(|c| c.to_string()),
                };
            }
        }
        PersistError::Db(err)
    }
}

impl PersistError {
    /// Convert into an API error, naming the resource kind in conflicts.
    pub fn into_api(self, kind: &str) -> ApiError {
        match self {
            PersistError::UniqueViolation { .. } => {
                ApiError::conflict(format!("{kind} with the same unique value already exists"))
            }
            PersistError::Db(err) => ApiError::persistence(err.to_string()),
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::UniqueViolation { .. } => ApiError::conflict("already exists"),
            PersistError::Db(e) => ApiError::persistence(e.to_string()),
        }
    }
}

/// Raw list query parameters as they arrive on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated list parameters. Page and limit are clamped to positive values,
/// the sort column is checked against the resource's whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub sort_by: &'static str,
    pub order: SortOrder,
    pub search: Option<String>,
}

pub const MAX_PAGE_SIZE: i64 = 100;

impl ListParams {
    pub fn for_resource<R: Resource>(query: &ListQuery) -> Self {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(R::DEFAULT_LIMIT)
            .clamp(1, MAX_PAGE_SIZE);

        let sort_by = query
            .sort_by
            .as_deref()
            .and_then(|requested| {
                R::SORTABLE
                    .iter()
                    .find(|col| **col == requested)
                    .copied()
            })
            .unwrap_or(R::DEFAULT_SORT);

        let order = match query.order.as_deref() {
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        Self {
            page,
            limit,
            sort_by,
            order,
            search,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Page metadata returned alongside every list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(params: &ListParams, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + params.limit - 1) / params.limit
        };
        Self {
            current_page: params.page,
            total_pages,
            total_items,
            has_next: params.page * params.limit < total_items,
            has_prev: params.page > 1,
        }
    }
}

/// Generic CRUD repository over one resource table.
pub struct Repository<R: Resource> {
    pool: PgPool,
    _marker: std::marker::PhantomData<R>,
}

impl<R: Resource> Repository<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: std::marker::PhantomData,
        }
    }

    pub async fn list(&self, params: &ListParams) -> Result<(Vec<R>, i64), PersistError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM ");
        qb.push(R::TABLE);
        push_search_clause::<R>(&mut qb, params);
        qb.push(" ORDER BY \"");
        qb.push(params.sort_by);
        qb.push("\" ");
        qb.push(params.order.as_sql());
        qb.push(" LIMIT ");
        qb.push_bind(params.limit);
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb.build_query_as::<R>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        count.push(R::TABLE);
        push_search_clause::<R>(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn find(&self, id: i32) -> Result<Option<R>, PersistError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", R::TABLE);
        let row = sqlx::query_as::<_, R>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn insert(&self, values: ColumnValues) -> Result<R, PersistError> {
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(R::TABLE);
        qb.push(" (");
        for (i, (col, _)) in values.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push("\"");
            qb.push(*col);
            qb.push("\"");
        }
        qb.push(") VALUES (");
        for (i, (_, value)) in values.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            value.push_bind(&mut qb);
        }
        qb.push(") RETURNING *");

        let row = qb.build_query_as::<R>().fetch_one(&self.pool).await?;
        Ok(row)
    }

    pub async fn update(&self, id: i32, values: ColumnValues) -> Result<Option<R>, PersistError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        qb.push(R::TABLE);
        qb.push(" SET ");
        for (col, value) in values.into_iter() {
            qb.push("\"");
            qb.push(col);
            qb.push("\" = ");
            value.push_bind(&mut qb);
            qb.push(", ");
        }
        qb.push("\"updated_at\" = NOW() WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING *");

        let row = qb.build_query_as::<R>().fetch_optional(&self.pool).await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> Result<Option<R>, PersistError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 RETURNING *", R::TABLE);
        let row = sqlx::query_as::<_, R>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

fn push_search_clause<R: Resource>(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
    if let (Some(col), Some(term)) = (R::SEARCH_COLUMN, params.search.as_deref()) {
        qb.push(" WHERE \"");
        qb.push(col);
        qb.push("\" ILIKE ");
        qb.push_bind(format!("%{term}%"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Article, Letter};

    #[test]
    fn page_and_limit_are_clamped_to_positive() {
        let query = ListQuery {
            page: Some(-3),
            limit: Some(0),
            ..Default::default()
        };
        let params = ListParams::for_resource::<Letter>(&query);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_capped() {
        let query = ListQuery {
            limit: Some(100_000),
            ..Default::default()
        };
        let params = ListParams::for_resource::<Letter>(&query);
        assert_eq!(params.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn unknown_sort_column_falls_back_to_default() {
        let query = ListQuery {
            sort_by: Some("id; DROP TABLE letters".to_string()),
            ..Default::default()
        };
        let params = ListParams::for_resource::<Letter>(&query);
        assert_eq!(params.sort_by, Letter::DEFAULT_SORT);
        assert_eq!(params.order, SortOrder::Desc);
    }

    #[test]
    fn whitelisted_sort_column_is_kept() {
        let query = ListQuery {
            sort_by: Some("date".to_string()),
            order: Some("ASC".to_string()),
            ..Default::default()
        };
        let params = ListParams::for_resource::<Article>(&query);
        assert_eq!(params.sort_by, "date");
        assert_eq!(params.order, SortOrder::Asc);
    }

    #[test]
    fn blank_search_is_dropped() {
        let query = ListQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        let params = ListParams::for_resource::<Letter>(&query);
        assert_eq!(params.search, None);
    }

    #[test]
    fn pagination_metadata() {
        let params = ListParams::for_resource::<Letter>(&ListQuery {
            page: Some(2),
            limit: Some(10),
            ..Default::default()
        });
        let meta = Pagination::new(&params, 25);
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total_items, 25);
        assert!(meta.has_next);
        assert!(meta.has_prev);

        let empty = Pagination::new(&params, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }
}
