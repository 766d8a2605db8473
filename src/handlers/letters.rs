use axum::{extract::State, routing::get, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::middleware::response::{ApiResponse, ApiResult};
use crate::resources::Letter;
use crate::state::AppState;

use super::resource;

/// Letter routes: the shared CRUD set plus a public stats endpoint.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .merge(resource::routes::<Letter>(state))
}

/// GET /api/letters/stats - collection totals for the admin dashboard:
/// overall count, count over the last 30 days, and the newest letter.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Value> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM letters")
        .fetch_one(&state.pool)
        .await?;

    let recent: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM letters WHERE created_at >= NOW() - INTERVAL '30 days'",
    )
    .fetch_one(&state.pool)
    .await?;

    let last_created: Option<(String, DateTime<Utc>)> =
        sqlx::query_as("SELECT title, created_at FROM letters ORDER BY created_at DESC LIMIT 1")
            .fetch_optional(&state.pool)
            .await?;

    Ok(ApiResponse::success(json!({
        "total": total,
        "recent": recent,
        "lastCreated": last_created.map(|(title, created_at)| json!({
            "title": title,
            "created_at": created_at,
        })),
    })))
}
